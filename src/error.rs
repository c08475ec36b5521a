use thiserror::Error;

use crate::types::BulkItemFailure;

#[derive(Error, Debug)]
pub enum SwitchyardError {
    // Transport errors
    #[error("transport failure talking to cluster {cluster}: {message}")]
    TransportFailure { cluster: String, message: String },

    #[error("cluster {cluster} returned {status}: {body}")]
    EngineError {
        cluster: String,
        status: u16,
        body: String,
    },

    // Rejected by the version policy
    #[error("create of index {index} was rejected: {response}")]
    CreateFailed { index: String, response: String },

    #[error("store of {doc_type}/{id} into {index} was rejected: {response}")]
    StoreFailed {
        index: String,
        doc_type: String,
        id: String,
        response: String,
    },

    #[error("update of {doc_type}/{id} in {index} was rejected: {response}")]
    UpdateFailed {
        index: String,
        doc_type: String,
        id: String,
        response: String,
    },

    #[error("bulk store into {index} failed for {} of the batch: {}", .failures.len(), describe_failures(.failures))]
    BulkStoreFailed {
        index: String,
        failures: Vec<BulkItemFailure>,
    },

    // Index and alias errors
    #[error("index not found: {index}")]
    IndexNotFound { index: String },

    #[error("index already exists: {index}")]
    IndexAlreadyExists { index: String },

    #[error("document {doc_type}/{id} not found in {index}")]
    DocumentNotFound {
        index: String,
        doc_type: String,
        id: String,
    },

    #[error("alias {alias} does not resolve to any generation")]
    AliasNotFound { alias: String },

    #[error("alias {alias} has no importing generation")]
    NotImporting { alias: String },

    // Fan-out errors
    #[error("cluster {cluster} does not support operation {operation}")]
    UnsupportedOperation { cluster: String, operation: String },

    #[error("no critical cluster configured")]
    NoCriticalCluster,

    // Registration errors
    #[error("index family not registered: {family}")]
    UnknownFamily { family: String },

    #[error("document type {doc_type} not registered for family {family}")]
    UnknownDocumentType { family: String, doc_type: String },

    #[error("mapping error: {0}")]
    Mapping(String),

    // Serialization errors
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SwitchyardError>;

fn describe_failures(failures: &[BulkItemFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("#{} id={} status={}", f.position + 1, f.id, f.status))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SwitchyardError {
    pub fn status_code(&self) -> u16 {
        match self {
            SwitchyardError::IndexNotFound { .. }
            | SwitchyardError::DocumentNotFound { .. }
            | SwitchyardError::AliasNotFound { .. }
            | SwitchyardError::UnknownFamily { .. }
            | SwitchyardError::UnknownDocumentType { .. } => 404,

            SwitchyardError::IndexAlreadyExists { .. } | SwitchyardError::NotImporting { .. } => {
                409
            }

            SwitchyardError::Validation(_) | SwitchyardError::Mapping(_) => 400,

            SwitchyardError::StoreFailed { .. }
            | SwitchyardError::UpdateFailed { .. }
            | SwitchyardError::BulkStoreFailed { .. }
            | SwitchyardError::CreateFailed { .. }
            | SwitchyardError::EngineError { .. } => 502,

            SwitchyardError::TransportFailure { .. } => 503,

            _ => 500,
        }
    }

    /// True for "the thing was already gone" answers from the engine.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SwitchyardError::IndexNotFound { .. } | SwitchyardError::DocumentNotFound { .. }
        )
    }
}
