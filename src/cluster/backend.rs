use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, SwitchyardError};
use crate::types::{AliasTable, BulkResponse, Document, DocumentFields};

/// Primitive operations against one search-engine cluster.
///
/// Every method defaults to `UnsupportedOperation`; a backend overrides the
/// operations it can actually perform. The fan-out relies on this so that an
/// operation a backend cannot handle fails loudly instead of being skipped.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Name used in logs, metrics and error reports.
    fn name(&self) -> &str;

    fn unsupported(&self, operation: &str) -> SwitchyardError {
        SwitchyardError::UnsupportedOperation {
            cluster: self.name().to_string(),
            operation: operation.to_string(),
        }
    }

    async fn create_index(&self, _index: &str, _mappings: &Value, _settings: &Value) -> Result<Value> {
        Err(self.unsupported("create_index"))
    }

    async fn store_document(&self, _index: &str, _document: &Document) -> Result<Value> {
        Err(self.unsupported("store_document"))
    }

    async fn update_document(
        &self,
        _index: &str,
        _doc_type: &str,
        _id: &str,
        _fields: &DocumentFields,
    ) -> Result<Value> {
        Err(self.unsupported("update_document"))
    }

    async fn bulk_store(
        &self,
        _index: &str,
        _doc_type: &str,
        _documents: &[Document],
    ) -> Result<BulkResponse> {
        Err(self.unsupported("bulk_store"))
    }

    async fn delete_document(&self, _index: &str, _doc_type: &str, _id: &str) -> Result<()> {
        Err(self.unsupported("delete_document"))
    }

    async fn refresh_index(&self, _index: &str) -> Result<()> {
        Err(self.unsupported("refresh_index"))
    }

    async fn close_index(&self, _index: &str) -> Result<()> {
        Err(self.unsupported("close_index"))
    }

    async fn delete_index(&self, _index: &str) -> Result<()> {
        Err(self.unsupported("delete_index"))
    }

    async fn assign_alias(&self, _index: &str, _alias: &str) -> Result<()> {
        Err(self.unsupported("assign_alias"))
    }

    async fn unassign_alias(&self, _index: &str, _alias: &str) -> Result<()> {
        Err(self.unsupported("unassign_alias"))
    }

    async fn set_alias(&self, _alias: &str, _index: &str) -> Result<()> {
        Err(self.unsupported("set_alias"))
    }

    async fn alias_table(&self) -> Result<AliasTable> {
        Err(self.unsupported("alias_table"))
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>> {
        let table = self.alias_table().await?;
        Ok(table.resolve(alias).map(str::to_string))
    }

    async fn alias_exists(&self, _alias: &str) -> Result<bool> {
        Err(self.unsupported("alias_exists"))
    }

    async fn list_generations(&self) -> Result<std::collections::BTreeSet<String>> {
        Ok(self.alias_table().await?.generations())
    }

    async fn search(&self, _index: &str, _query: &Value) -> Result<Value> {
        Err(self.unsupported("search"))
    }
}
