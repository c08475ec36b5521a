use std::collections::BTreeSet;

use serde_json::Value;

use super::ClusterBackend;
use crate::error::{Result, SwitchyardError};
use crate::types::{AliasTable, BulkResponse, Document, DocumentFields};

/// One logical operation to replicate across clusters.
#[derive(Debug, Clone)]
pub enum ClusterOperation {
    CreateIndex {
        index: String,
        mappings: Value,
        settings: Value,
    },
    StoreDocument {
        index: String,
        document: Document,
    },
    UpdateDocument {
        index: String,
        doc_type: String,
        id: String,
        fields: DocumentFields,
    },
    BulkStore {
        index: String,
        doc_type: String,
        documents: Vec<Document>,
    },
    DeleteDocument {
        index: String,
        doc_type: String,
        id: String,
    },
    RefreshIndex {
        index: String,
    },
    CloseIndex {
        index: String,
    },
    /// Delete an index, treating "not found" as success on every cluster.
    DropIndex {
        index: String,
    },
    AssignAlias {
        index: String,
        alias: String,
    },
    UnassignAlias {
        index: String,
        alias: String,
    },
    SetAlias {
        alias: String,
        index: String,
    },
    AliasTable,
    ResolveAlias {
        alias: String,
    },
    AliasExists {
        alias: String,
    },
    ListGenerations,
    Search {
        index: String,
        query: Value,
    },
}

impl ClusterOperation {
    pub fn name(&self) -> &'static str {
        match self {
            ClusterOperation::CreateIndex { .. } => "create_index",
            ClusterOperation::StoreDocument { .. } => "store_document",
            ClusterOperation::UpdateDocument { .. } => "update_document",
            ClusterOperation::BulkStore { .. } => "bulk_store",
            ClusterOperation::DeleteDocument { .. } => "delete_document",
            ClusterOperation::RefreshIndex { .. } => "refresh_index",
            ClusterOperation::CloseIndex { .. } => "close_index",
            ClusterOperation::DropIndex { .. } => "drop_index",
            ClusterOperation::AssignAlias { .. } => "assign_alias",
            ClusterOperation::UnassignAlias { .. } => "unassign_alias",
            ClusterOperation::SetAlias { .. } => "set_alias",
            ClusterOperation::AliasTable => "alias_table",
            ClusterOperation::ResolveAlias { .. } => "resolve_alias",
            ClusterOperation::AliasExists { .. } => "alias_exists",
            ClusterOperation::ListGenerations => "list_generations",
            ClusterOperation::Search { .. } => "search",
        }
    }

    /// Read-only operations are served by one representative critical cluster.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            ClusterOperation::AliasTable
                | ClusterOperation::ResolveAlias { .. }
                | ClusterOperation::AliasExists { .. }
                | ClusterOperation::ListGenerations
                | ClusterOperation::Search { .. }
        )
    }

    /// Run this operation against a single backend.
    pub async fn apply(&self, backend: &dyn ClusterBackend) -> Result<OperationOutput> {
        match self {
            ClusterOperation::CreateIndex {
                index,
                mappings,
                settings,
            } => backend
                .create_index(index, mappings, settings)
                .await
                .map(OperationOutput::Ack),
            ClusterOperation::StoreDocument { index, document } => backend
                .store_document(index, document)
                .await
                .map(OperationOutput::Ack),
            ClusterOperation::UpdateDocument {
                index,
                doc_type,
                id,
                fields,
            } => backend
                .update_document(index, doc_type, id, fields)
                .await
                .map(OperationOutput::Ack),
            ClusterOperation::BulkStore {
                index,
                doc_type,
                documents,
            } => backend
                .bulk_store(index, doc_type, documents)
                .await
                .map(OperationOutput::Bulk),
            ClusterOperation::DeleteDocument {
                index,
                doc_type,
                id,
            } => backend
                .delete_document(index, doc_type, id)
                .await
                .map(|_| OperationOutput::Done),
            ClusterOperation::RefreshIndex { index } => {
                backend.refresh_index(index).await.map(|_| OperationOutput::Done)
            }
            ClusterOperation::CloseIndex { index } => {
                backend.close_index(index).await.map(|_| OperationOutput::Done)
            }
            ClusterOperation::DropIndex { index } => match backend.delete_index(index).await {
                Ok(()) | Err(SwitchyardError::IndexNotFound { .. }) => Ok(OperationOutput::Done),
                Err(e) => Err(e),
            },
            ClusterOperation::AssignAlias { index, alias } => backend
                .assign_alias(index, alias)
                .await
                .map(|_| OperationOutput::Done),
            ClusterOperation::UnassignAlias { index, alias } => backend
                .unassign_alias(index, alias)
                .await
                .map(|_| OperationOutput::Done),
            ClusterOperation::SetAlias { alias, index } => backend
                .set_alias(alias, index)
                .await
                .map(|_| OperationOutput::Done),
            ClusterOperation::AliasTable => {
                backend.alias_table().await.map(OperationOutput::Aliases)
            }
            ClusterOperation::ResolveAlias { alias } => {
                backend.resolve_alias(alias).await.map(OperationOutput::Alias)
            }
            ClusterOperation::AliasExists { alias } => {
                backend.alias_exists(alias).await.map(OperationOutput::Exists)
            }
            ClusterOperation::ListGenerations => backend
                .list_generations()
                .await
                .map(OperationOutput::Generations),
            ClusterOperation::Search { index, query } => {
                backend.search(index, query).await.map(OperationOutput::Search)
            }
        }
    }
}

/// Result of one operation on one cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    Ack(Value),
    Bulk(BulkResponse),
    Aliases(AliasTable),
    Alias(Option<String>),
    Exists(bool),
    Generations(BTreeSet<String>),
    Search(Value),
    Done,
}

fn unexpected(expected: &str, got: &OperationOutput) -> SwitchyardError {
    SwitchyardError::Validation(format!(
        "expected {expected} output, got {got:?}"
    ))
}

impl OperationOutput {
    pub fn into_aliases(self) -> Result<AliasTable> {
        match self {
            OperationOutput::Aliases(table) => Ok(table),
            other => Err(unexpected("alias table", &other)),
        }
    }

    pub fn into_alias(self) -> Result<Option<String>> {
        match self {
            OperationOutput::Alias(alias) => Ok(alias),
            other => Err(unexpected("alias", &other)),
        }
    }

    pub fn into_exists(self) -> Result<bool> {
        match self {
            OperationOutput::Exists(exists) => Ok(exists),
            other => Err(unexpected("exists", &other)),
        }
    }

    pub fn into_generations(self) -> Result<BTreeSet<String>> {
        match self {
            OperationOutput::Generations(generations) => Ok(generations),
            other => Err(unexpected("generations", &other)),
        }
    }

    pub fn into_search(self) -> Result<Value> {
        match self {
            OperationOutput::Search(body) => Ok(body),
            other => Err(unexpected("search", &other)),
        }
    }
}
