#![allow(dead_code)]

pub mod engine;
pub mod server;

use std::sync::Arc;

use serde_json::{json, Value};

use switchyard::cluster::{ClusterFanout, ClusterPool, LoggingErrorSink};
use switchyard::config::{ClientConfig, ClusterConfig};
use switchyard::lifecycle::IndexLifecycle;
use switchyard::mapping::{FamilyRegistration, FieldDefinitions, JsonMapping};
use switchyard::policy::EngineVersion;

/// Client settings for tests: fail fast, no retries.
pub fn test_client_config() -> ClientConfig {
    ClientConfig {
        timeout_secs: 2,
        connect_timeout_secs: 1,
        retries: 0,
        pool_max_idle_per_host: 4,
    }
}

pub fn fanout_for(clusters: &[ClusterConfig]) -> Arc<ClusterFanout> {
    switchyard::metrics::init();
    let pool = ClusterPool::new(test_client_config(), EngineVersion::Modern.policy());
    Arc::new(ClusterFanout::from_config(&pool, clusters, Arc::new(LoggingErrorSink)).unwrap())
}

/// A `products` family with one `product` document type keyed by `id`.
pub fn product_family() -> Arc<FamilyRegistration<Value>> {
    let fields = FieldDefinitions::from([
        ("name".to_string(), json!({"type": "string"})),
        ("price".to_string(), json!({"type": "float"})),
    ]);
    Arc::new(
        FamilyRegistration::new("products", json!({"number_of_shards": 1}))
            .with_mapping(Arc::new(JsonMapping::new("product", "id", fields))),
    )
}

pub fn lifecycle(fanout: Arc<ClusterFanout>, alias: &str) -> IndexLifecycle<Value> {
    IndexLifecycle::new(alias, product_family(), fanout, 100)
}

pub fn product(id: &str, name: &str) -> Value {
    json!({"id": id, "name": name, "price": 9.5})
}

pub fn products(ids: &[&str]) -> Vec<Value> {
    ids.iter().map(|id| product(id, &format!("item {id}"))).collect()
}
