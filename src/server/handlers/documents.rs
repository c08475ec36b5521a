use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::SwitchyardError;
use crate::server::AppState;
use crate::types::DocumentFields;

use super::ApiError;

#[derive(Debug, Serialize)]
pub struct StoreResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub records: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct BulkResponseBody {
    pub stored: usize,
    pub took_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub fields: DocumentFields,
}

/// Maps one record through the document type and stores it through the alias.
#[instrument(skip(state, record), fields(family = %family, doc_type = %doc_type))]
pub async fn store_document(
    State(state): State<AppState>,
    Path((family, doc_type)): Path<(String, String)>,
    Json(record): Json<Value>,
) -> Result<(StatusCode, Json<StoreResponse>), ApiError> {
    let lifecycle = state.family(&family).map_err(ApiError::from)?;
    let document = lifecycle
        .store(&doc_type, &record)
        .await
        .map_err(ApiError::from)?;
    Ok((
        StatusCode::CREATED,
        Json(StoreResponse {
            id: document.id,
            doc_type: document.doc_type,
        }),
    ))
}

#[instrument(skip(state, req), fields(family = %family, doc_type = %doc_type, records = req.records.len()))]
pub async fn bulk_store(
    State(state): State<AppState>,
    Path((family, doc_type)): Path<(String, String)>,
    Json(req): Json<BulkRequest>,
) -> Result<Json<BulkResponseBody>, ApiError> {
    if req.records.is_empty() {
        return Err(ApiError(SwitchyardError::Validation(
            "records array cannot be empty".into(),
        )));
    }
    let lifecycle = state.family(&family).map_err(ApiError::from)?;
    let response = lifecycle
        .bulk_store(&doc_type, &req.records)
        .await
        .map_err(ApiError::from)?;

    info!(family = %family, doc_type = %doc_type, stored = response.stored, "bulk stored");
    Ok(Json(BulkResponseBody {
        stored: response.stored,
        took_ms: response.took_ms,
    }))
}

#[instrument(skip(state, req), fields(family = %family, doc_type = %doc_type, id = %id))]
pub async fn update_document(
    State(state): State<AppState>,
    Path((family, doc_type, id)): Path<(String, String, String)>,
    Json(req): Json<UpdateRequest>,
) -> Result<StatusCode, ApiError> {
    if req.fields.is_empty() {
        return Err(ApiError(SwitchyardError::Validation(
            "fields cannot be empty".into(),
        )));
    }
    state
        .family(&family)
        .map_err(ApiError::from)?
        .update(&doc_type, &id, req.fields)
        .await
        .map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state), fields(family = %family, doc_type = %doc_type, id = %id))]
pub async fn delete_document(
    State(state): State<AppState>,
    Path((family, doc_type, id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .family(&family)
        .map_err(ApiError::from)?
        .delete_by_id(&doc_type, &id)
        .await
        .map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}
