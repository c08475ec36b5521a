use tokio::net::TcpListener;

use switchyard::config::{ClusterConfig, Config, DocumentTypeConfig, FamilyConfig};
use switchyard::server::routes::build_router;
use switchyard::startup::build_state;

use super::test_client_config;

/// Config with one `products` family served from `clusters`.
pub fn test_config(clusters: Vec<ClusterConfig>) -> Config {
    let mut config = Config::default();
    config.client = test_client_config();
    config.clusters = clusters;
    config.indexing.alias_suffix = Some("test".to_string());
    config.indexing.batch_size = 2;
    config.families = vec![FamilyConfig {
        name: "products".to_string(),
        settings: None,
        document_types: vec![DocumentTypeConfig {
            name: "product".to_string(),
            id_field: "id".to_string(),
            fields: Default::default(),
        }],
    }];
    config
}

/// Start the admin server on an ephemeral port and return its base URL.
pub async fn start_test_server(config: Config) -> String {
    // Ensure metrics are registered (idempotent)
    switchyard::metrics::init();

    config.validate().unwrap();
    let state = build_state(config).unwrap();
    let app = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    base_url
}
