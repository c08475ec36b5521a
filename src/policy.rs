//! Engine-version response interpretation.
//!
//! Each search-engine major version answers create/store/bulk calls with a
//! different body shape. A `VersionPolicy` turns those bodies into a yes/no
//! so the cluster client never inspects version-specific fields itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success predicates for one engine API version.
pub trait VersionPolicy: Send + Sync {
    fn create_successful(&self, response: &Value) -> bool;
    fn store_successful(&self, response: &Value) -> bool;
    fn update_successful(&self, response: &Value) -> bool;
    /// Inspect one entry of a bulk response's `items` (the inner action object).
    fn operation_successful_on_bulk_item(&self, item: &Value) -> bool;
    /// Name of the per-item field carrying the outcome.
    fn response_status_field(&self) -> &'static str;
}

/// Engine version selector used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineVersion {
    /// 0.90-era engines acknowledging with `"ok": true`.
    Legacy,
    /// 1.x and later: `acknowledged`, `_version`, per-item HTTP `status`.
    #[default]
    Modern,
}

impl EngineVersion {
    pub fn policy(self) -> Arc<dyn VersionPolicy> {
        match self {
            EngineVersion::Legacy => Arc::new(LegacyPolicy),
            EngineVersion::Modern => Arc::new(ModernPolicy),
        }
    }
}

impl std::fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineVersion::Legacy => write!(f, "legacy"),
            EngineVersion::Modern => write!(f, "modern"),
        }
    }
}

impl std::str::FromStr for EngineVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "0.90" => Ok(EngineVersion::Legacy),
            "modern" | "1.x" => Ok(EngineVersion::Modern),
            other => Err(format!("unknown engine version '{other}'")),
        }
    }
}

fn is_true(response: &Value, field: &str) -> bool {
    response.get(field).and_then(Value::as_bool) == Some(true)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyPolicy;

impl VersionPolicy for LegacyPolicy {
    fn create_successful(&self, response: &Value) -> bool {
        is_true(response, "ok")
    }

    fn store_successful(&self, response: &Value) -> bool {
        is_true(response, "ok")
    }

    fn update_successful(&self, response: &Value) -> bool {
        is_true(response, "ok")
    }

    fn operation_successful_on_bulk_item(&self, item: &Value) -> bool {
        is_true(item, self.response_status_field())
    }

    fn response_status_field(&self) -> &'static str {
        "ok"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModernPolicy;

impl VersionPolicy for ModernPolicy {
    fn create_successful(&self, response: &Value) -> bool {
        is_true(response, "acknowledged")
    }

    fn store_successful(&self, response: &Value) -> bool {
        response.get("error").is_none() && response.get("_version").and_then(Value::as_u64).is_some()
    }

    fn update_successful(&self, response: &Value) -> bool {
        response.get("error").is_none() && response.get("_id").and_then(Value::as_str).is_some()
    }

    fn operation_successful_on_bulk_item(&self, item: &Value) -> bool {
        matches!(
            item.get(self.response_status_field()).and_then(Value::as_u64),
            Some(200) | Some(201)
        )
    }

    fn response_status_field(&self) -> &'static str {
        "status"
    }
}
