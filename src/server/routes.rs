use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers::{documents, families, health, metrics, search};
use super::middleware;
use super::AppState;

/// Builds the axum router with all routes, middleware, and shared state.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let body_limit = state.config.server.max_request_body_mb * 1024 * 1024;

    // Health checks and scrapes skip the trace layer; they are polled constantly.
    let health_routes = Router::new()
        .route("/healthz", get(health::health_check))
        .route("/readyz", get(health::readiness_check))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::http_metrics,
        ));

    let api_routes = Router::new()
        .route("/v1/families", get(families::list_families))
        .route("/v1/families/:family", get(families::get_family))
        .route(
            "/v1/families/:family/generations",
            post(families::create_generation),
        )
        .route(
            "/v1/families/:family/import/begin",
            post(families::import_begin),
        )
        .route("/v1/families/:family/import", post(families::import))
        .route("/v1/families/:family/switch", post(families::switch_alias))
        .route("/v1/families/:family/cleanup", post(families::cleanup))
        .route("/v1/families/:family/rebuild", post(families::rebuild))
        .route("/v1/families/:family/reindex", post(families::reindex))
        .route("/v1/families/:family/search", post(search::search_family))
        .route(
            "/v1/families/:family/documents/:doc_type",
            put(documents::store_document),
        )
        .route(
            "/v1/families/:family/documents/:doc_type/bulk",
            post(documents::bulk_store),
        )
        .route(
            "/v1/families/:family/documents/:doc_type/:id",
            patch(documents::update_document).delete(documents::delete_document),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::http_metrics,
        ))
        .layer(TimeoutLayer::new(timeout))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(axum::middleware::from_fn(middleware::request_id));

    health_routes.merge(api_routes).with_state(state)
}
