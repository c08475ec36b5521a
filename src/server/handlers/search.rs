use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::query::{QueryResultView, SearchQuery};
use crate::server::AppState;

use super::ApiError;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Engine query body, forwarded as-is (`query`, `facets`, `aggs`, `sort`...).
    #[serde(default)]
    pub query: Value,
    #[serde(default)]
    pub from: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub ids: Vec<String>,
    pub hits: Vec<Value>,
    pub total: u64,
    pub current_page: u64,
    pub per_page: u64,
    pub total_pages: u64,
    pub next_page: Option<u64>,
    pub previous_page: Option<u64>,
    pub out_of_bounds: bool,
    pub facets: Map<String, Value>,
    pub aggregations: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub took_ms: Option<u64>,
}

impl From<&QueryResultView> for SearchResponse {
    fn from(view: &QueryResultView) -> Self {
        Self {
            ids: view.ids(),
            hits: view.hits().to_vec(),
            total: view.total_hits(),
            current_page: view.current_page(),
            per_page: view.per_page(),
            total_pages: view.total_pages(),
            next_page: view.next_page(),
            previous_page: view.previous_page(),
            out_of_bounds: view.out_of_bounds(),
            facets: view.facets(),
            aggregations: view.aggregations(),
            took_ms: view.took_ms(),
        }
    }
}

#[instrument(skip(state, req), fields(family = %family, from = ?req.from, size = ?req.size))]
pub async fn search_family(
    State(state): State<AppState>,
    Path(family): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let lifecycle = state.family(&family)?;
    let query = SearchQuery {
        body: req.query,
        from: req.from,
        size: req.size,
    };
    let view = lifecycle.search(query).await?;
    Ok(Json(SearchResponse::from(&view)))
}
