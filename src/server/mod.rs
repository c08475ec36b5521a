pub mod handlers;
pub mod middleware;
pub mod routes;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::cluster::ClusterFanout;
use crate::config::Config;
use crate::error::{Result, SwitchyardError};
use crate::lifecycle::IndexLifecycle;

/// Family name → lifecycle over JSON records.
pub type FamilyMap = BTreeMap<String, Arc<IndexLifecycle<Value>>>;

/// Shared application state injected into all handlers via axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fanout: Arc<ClusterFanout>,
    pub families: Arc<FamilyMap>,
}

impl AppState {
    pub fn family(&self, name: &str) -> Result<Arc<IndexLifecycle<Value>>> {
        self.families
            .get(name)
            .cloned()
            .ok_or_else(|| SwitchyardError::UnknownFamily {
                family: name.to_string(),
            })
    }
}
