use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::server::AppState;

/// Liveness check: returns 200 OK if the server process is running.
pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Readiness check: every critical cluster must answer an alias-table read.
/// Dispensable clusters never affect readiness. Once ready, each family reports
/// whether its alias exists yet; a family with nothing live does not make the
/// service unready.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let mut clusters = serde_json::Map::new();
    let mut ready = true;
    for (name, result) in state.fanout.ping_critical().await {
        let entry = match result {
            Ok(()) => json!({"reachable": true}),
            Err(e) => {
                ready = false;
                json!({"reachable": false, "error": e.to_string()})
            }
        };
        clusters.insert(name, entry);
    }

    if ready {
        let mut families = serde_json::Map::new();
        for (name, lifecycle) in state.families.iter() {
            let entry = match lifecycle.is_serving().await {
                Ok(serving) => json!({"alias": lifecycle.alias(), "serving": serving}),
                Err(e) => json!({"alias": lifecycle.alias(), "serving": false, "error": e.to_string()}),
            };
            families.insert(name.clone(), entry);
        }
        Ok(Json(json!({"status": "ready", "clusters": clusters, "families": families})))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not_ready", "clusters": clusters})),
        ))
    }
}
