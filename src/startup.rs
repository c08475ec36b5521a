//! Application startup and bootstrap logic.
//!
//! Kept out of `main.rs` so the wiring can be exercised under `cargo test`
//! against the in-process fake engine instead of a real cluster.

use std::sync::Arc;

use axum::Router;
use tracing_subscriber::EnvFilter;

use crate::cluster::{ClusterFanout, ClusterPool, LoggingErrorSink};
use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::IndexLifecycle;
use crate::mapping::MappingRegistry;
use crate::server::routes::build_router;
use crate::server::{AppState, FamilyMap};

/// Resolve the configuration file path.
///
/// Priority:
/// 1. `SWITCHYARD_CONFIG` environment variable
/// 2. `./switchyard.toml` if it exists
/// 3. None (use defaults)
pub fn resolve_config_path() -> Option<String> {
    std::env::var("SWITCHYARD_CONFIG").ok().or_else(|| {
        let default = "switchyard.toml";
        std::path::Path::new(default)
            .exists()
            .then(|| default.to_string())
    })
}

/// Initialize tracing subscriber from logging config.
///
/// Supports JSON and plain text formats. Uses `RUST_LOG` env var if set,
/// otherwise falls back to `config.logging.level`.
pub fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

/// Wire clusters, mappings and one lifecycle per configured family.
pub fn build_state(config: Config) -> Result<AppState> {
    let policy = config.engine.version.policy();
    let pool = ClusterPool::new(config.client.clone(), policy);
    let fanout = Arc::new(ClusterFanout::from_config(
        &pool,
        &config.clusters,
        Arc::new(LoggingErrorSink),
    )?);

    let registry = MappingRegistry::from_config(&config.families)?;
    let mut families = FamilyMap::new();
    for family in registry.families() {
        let alias = config.indexing.alias_for(family.name());
        let lifecycle = IndexLifecycle::new(
            alias,
            family.clone(),
            fanout.clone(),
            config.indexing.batch_size,
        );
        families.insert(family.name().to_string(), Arc::new(lifecycle));
    }

    Ok(AppState {
        config: Arc::new(config),
        fanout,
        families: Arc::new(families),
    })
}

/// Build the application router.
///
/// Each family's current state is discovered and logged; an unreachable
/// cluster at startup is logged, not fatal, so `/readyz` can report it.
pub async fn build_app(
    config: Config,
) -> std::result::Result<Router, Box<dyn std::error::Error>> {
    tracing::info!("switchyard starting");
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        engine = %config.engine.version,
        clusters = config.clusters.len(),
        families = config.families.len(),
        batch_size = config.indexing.batch_size,
        "configuration loaded"
    );

    crate::metrics::init();

    let state = build_state(config)?;
    tracing::info!(
        critical = ?state.fanout.critical_names(),
        dispensable = ?state.fanout.dispensable_names(),
        "cluster fan-out ready"
    );

    for (name, lifecycle) in state.families.iter() {
        match lifecycle.status().await {
            Ok(status) => tracing::info!(
                family = %name,
                alias = %status.alias,
                state = %status.state,
                live = ?status.live,
                importing = ?status.importing,
                generations = status.generations.len(),
                "discovered family"
            ),
            Err(e) => tracing::warn!(family = %name, error = %e, "failed to read family state on startup"),
        }
    }

    Ok(build_router(state))
}
