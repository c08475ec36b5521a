use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;

use switchyard::config::Config;
use switchyard::startup::{build_app, init_logging, resolve_config_path};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env
    let _ = dotenvy::dotenv();

    // Load config (priority: SWITCHYARD_CONFIG env var > ./switchyard.toml > defaults)
    let config = Config::load(resolve_config_path().as_deref())?;

    init_logging(&config);

    let app = build_app(config.clone()).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %addr, "listening");

    let listener = TcpListener::bind(&addr).await?;

    let shutdown_signal = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();
        tokio::select! {
            _ = ctrl_c => tracing::info!("received SIGINT"),
            _ = terminate => tracing::info!("received SIGTERM"),
        }
    };

    // Flipped once a signal arrives; bounds how long in-flight requests may drain.
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal.await;
        let _ = stop_tx.send(true);
    });
    let drain_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    let drain_deadline = async move {
        if stop_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        res = server => {
            res?;
            tracing::info!("server drained");
        }
        _ = drain_deadline => {
            tracing::warn!(timeout_secs = config.server.shutdown_timeout_secs, "drain timed out, exiting");
        }
    }
    tracing::info!("switchyard shutdown complete");

    Ok(())
}
