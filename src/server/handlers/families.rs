use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::SwitchyardError;
use crate::feed::VecFeed;
use crate::lifecycle::{CleanupReport, FamilyStatus, RebuildImport, RebuildOptions, ReindexReport};
use crate::server::AppState;

use super::ApiError;

#[derive(Debug, Serialize)]
pub struct FamilyResponse {
    pub name: String,
    pub document_types: Vec<String>,
    #[serde(flatten)]
    pub status: FamilyStatus,
}

#[derive(Debug, Deserialize)]
pub struct GenerationRequest {
    pub generation: String,
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub generation: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub document_type: String,
    pub records: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
}

#[derive(Debug, Deserialize)]
pub struct RebuildRequest {
    #[serde(default = "default_switch")]
    pub switch: bool,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub records: Option<Vec<Value>>,
}

fn default_switch() -> bool {
    true
}

#[instrument(skip(state))]
pub async fn list_families(
    State(state): State<AppState>,
) -> Result<Json<Vec<FamilyResponse>>, ApiError> {
    let mut out = Vec::with_capacity(state.families.len());
    for (name, lifecycle) in state.families.iter() {
        out.push(FamilyResponse {
            name: name.clone(),
            document_types: lifecycle.family().doc_types().map(str::to_string).collect(),
            status: lifecycle.status().await?,
        });
    }
    Ok(Json(out))
}

#[instrument(skip(state), fields(family = %family))]
pub async fn get_family(
    State(state): State<AppState>,
    Path(family): Path<String>,
) -> Result<Json<FamilyResponse>, ApiError> {
    let lifecycle = state.family(&family)?;
    Ok(Json(FamilyResponse {
        document_types: lifecycle.family().doc_types().map(str::to_string).collect(),
        status: lifecycle.status().await?,
        name: family,
    }))
}

#[instrument(skip(state), fields(family = %family))]
pub async fn create_generation(
    State(state): State<AppState>,
    Path(family): Path<String>,
) -> Result<(StatusCode, Json<GenerationResponse>), ApiError> {
    let generation = state.family(&family)?.create().await?;
    Ok((StatusCode::CREATED, Json(GenerationResponse { generation })))
}

#[instrument(skip(state, req), fields(family = %family, generation = %req.generation))]
pub async fn import_begin(
    State(state): State<AppState>,
    Path(family): Path<String>,
    Json(req): Json<GenerationRequest>,
) -> Result<Json<FamilyStatus>, ApiError> {
    let lifecycle = state.family(&family)?;
    lifecycle.import_begin(&req.generation).await?;
    Ok(Json(lifecycle.status().await?))
}

#[instrument(skip(state, req), fields(family = %family, records = req.records.len()))]
pub async fn import(
    State(state): State<AppState>,
    Path(family): Path<String>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    let lifecycle = state.family(&family)?;
    let mut feed = VecFeed::new(req.records, state.config.indexing.batch_size);
    let imported = lifecycle.import(&req.document_type, &mut feed).await?;
    Ok(Json(ImportResponse { imported }))
}

#[instrument(skip(state, req), fields(family = %family, generation = %req.generation))]
pub async fn switch_alias(
    State(state): State<AppState>,
    Path(family): Path<String>,
    Json(req): Json<GenerationRequest>,
) -> Result<Json<FamilyStatus>, ApiError> {
    let lifecycle = state.family(&family)?;
    lifecycle.switch_alias(&req.generation).await?;
    Ok(Json(lifecycle.status().await?))
}

#[instrument(skip(state), fields(family = %family))]
pub async fn cleanup(
    State(state): State<AppState>,
    Path(family): Path<String>,
) -> Result<Json<CleanupReport>, ApiError> {
    let report = state.family(&family)?.cleanup_old_indices().await?;
    Ok(Json(report))
}

#[instrument(skip(state, req), fields(family = %family, switch = req.switch))]
pub async fn rebuild(
    State(state): State<AppState>,
    Path(family): Path<String>,
    Json(req): Json<RebuildRequest>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let lifecycle = state.family(&family)?;
    let import = match (req.document_type, req.records) {
        (Some(doc_type), Some(records)) => Some(RebuildImport {
            doc_type,
            feed: Box::new(VecFeed::new(records, state.config.indexing.batch_size)),
        }),
        (None, None) => None,
        _ => {
            return Err(ApiError(SwitchyardError::Validation(
                "document_type and records must be given together".into(),
            )))
        }
    };

    info!(family = %family, "rebuilding generation");
    let generation = lifecycle
        .rebuild(RebuildOptions {
            switch: req.switch,
            import,
        })
        .await?;
    Ok(Json(GenerationResponse { generation }))
}

#[instrument(skip(state, req), fields(family = %family, records = req.records.len()))]
pub async fn reindex(
    State(state): State<AppState>,
    Path(family): Path<String>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ReindexReport>, ApiError> {
    let lifecycle = state.family(&family)?;
    let mut feed = VecFeed::new(req.records, state.config.indexing.batch_size);
    let report = lifecycle.reindex(&req.document_type, &mut feed).await?;
    Ok(Json(report))
}
