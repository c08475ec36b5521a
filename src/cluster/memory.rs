use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::ClusterBackend;
use crate::error::{Result, SwitchyardError};
use crate::types::{AliasTable, BulkResponse, Document, DocumentFields};

#[derive(Debug, Default, Clone)]
struct MemoryIndex {
    aliases: BTreeSet<String>,
    /// (doc_type, id) → fields
    documents: BTreeMap<(String, String), DocumentFields>,
    closed: bool,
}

/// In-process cluster for tests and local development.
///
/// Keeps indices, documents and alias edges in memory and honours the same
/// error contract as `ClusterClient`. Named operations can be made to fail
/// with a transport error to simulate an unreachable or flaky cluster.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    name: String,
    indices: Mutex<BTreeMap<String, MemoryIndex>>,
    failing: Mutex<BTreeSet<String>>,
    /// Creates still to be answered with "already exists".
    conflicts: Mutex<usize>,
    calls: Mutex<BTreeMap<String, usize>>,
}

impl MemoryCluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Make every subsequent call of `operation` fail (`"*"` fails everything).
    pub async fn fail_on(&self, operation: &str) {
        self.failing.lock().await.insert(operation.to_string());
    }

    /// Answer the next `count` creates with `IndexAlreadyExists`, as if
    /// another writer had just created the index.
    pub async fn conflict_on_create(&self, count: usize) {
        *self.conflicts.lock().await = count;
    }

    /// How many times `operation` has been called.
    pub async fn calls(&self, operation: &str) -> usize {
        self.calls.lock().await.get(operation).copied().unwrap_or(0)
    }

    pub async fn heal(&self) {
        self.failing.lock().await.clear();
    }

    pub async fn index_names(&self) -> Vec<String> {
        self.indices.lock().await.keys().cloned().collect()
    }

    pub async fn is_closed(&self, index: &str) -> bool {
        self.indices
            .lock()
            .await
            .get(index)
            .map(|i| i.closed)
            .unwrap_or(false)
    }

    pub async fn document(&self, index: &str, doc_type: &str, id: &str) -> Option<DocumentFields> {
        self.indices
            .lock()
            .await
            .get(index)
            .and_then(|i| i.documents.get(&(doc_type.to_string(), id.to_string())))
            .cloned()
    }

    pub async fn document_count(&self, index: &str) -> usize {
        self.indices
            .lock()
            .await
            .get(index)
            .map(|i| i.documents.len())
            .unwrap_or(0)
    }

    async fn check(&self, operation: &str) -> Result<()> {
        *self.calls.lock().await.entry(operation.to_string()).or_default() += 1;
        let failing = self.failing.lock().await;
        if failing.contains(operation) || failing.contains("*") {
            return Err(SwitchyardError::TransportFailure {
                cluster: self.name.clone(),
                message: format!("injected failure on {operation}"),
            });
        }
        Ok(())
    }

    fn not_found(index: &str) -> SwitchyardError {
        SwitchyardError::IndexNotFound {
            index: index.to_string(),
        }
    }
}

/// Concrete index names addressed by `target`: the index itself, or every
/// index holding it as an alias.
fn targets(indices: &BTreeMap<String, MemoryIndex>, target: &str) -> Vec<String> {
    if indices.contains_key(target) {
        return vec![target.to_string()];
    }
    indices
        .iter()
        .filter(|(_, i)| i.aliases.contains(target))
        .map(|(name, _)| name.clone())
        .collect()
}

/// The single writable index behind `target`.
fn write_target<'a>(
    indices: &'a mut BTreeMap<String, MemoryIndex>,
    target: &str,
) -> Result<&'a mut MemoryIndex> {
    let name = match targets(indices, target).as_slice() {
        [one] => one.clone(),
        _ => return Err(MemoryCluster::not_found(target)),
    };
    indices.get_mut(&name).ok_or_else(|| MemoryCluster::not_found(target))
}

#[async_trait]
impl ClusterBackend for MemoryCluster {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_index(&self, index: &str, _mappings: &Value, _settings: &Value) -> Result<Value> {
        self.check("create_index").await?;
        let conflict = {
            let mut conflicts = self.conflicts.lock().await;
            let pending = *conflicts > 0;
            *conflicts = conflicts.saturating_sub(1);
            pending
        };
        let mut indices = self.indices.lock().await;
        if conflict || indices.contains_key(index) {
            return Err(SwitchyardError::IndexAlreadyExists {
                index: index.to_string(),
            });
        }
        indices.insert(index.to_string(), MemoryIndex::default());
        debug!(cluster = %self.name, index, "memory index created");
        Ok(json!({ "acknowledged": true }))
    }

    async fn store_document(&self, index: &str, document: &Document) -> Result<Value> {
        self.check("store_document").await?;
        let mut indices = self.indices.lock().await;
        let target = write_target(&mut indices, index)?;
        target.documents.insert(
            (document.doc_type.clone(), document.id.clone()),
            document.fields.clone(),
        );
        Ok(json!({ "_id": document.id, "_version": 1, "created": true }))
    }

    async fn update_document(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        fields: &DocumentFields,
    ) -> Result<Value> {
        self.check("update_document").await?;
        let mut indices = self.indices.lock().await;
        let target = write_target(&mut indices, index)?;
        let existing = target
            .documents
            .get_mut(&(doc_type.to_string(), id.to_string()))
            .ok_or_else(|| SwitchyardError::DocumentNotFound {
                index: index.to_string(),
                doc_type: doc_type.to_string(),
                id: id.to_string(),
            })?;
        existing.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(json!({ "_id": id }))
    }

    async fn bulk_store(
        &self,
        index: &str,
        doc_type: &str,
        documents: &[Document],
    ) -> Result<BulkResponse> {
        self.check("bulk_store").await?;
        let mut indices = self.indices.lock().await;
        let target = write_target(&mut indices, index)?;
        for document in documents {
            target
                .documents
                .insert((doc_type.to_string(), document.id.clone()), document.fields.clone());
        }
        Ok(BulkResponse {
            index: index.to_string(),
            stored: documents.len(),
            took_ms: 0,
        })
    }

    async fn delete_document(&self, index: &str, doc_type: &str, id: &str) -> Result<()> {
        self.check("delete_document").await?;
        let mut indices = self.indices.lock().await;
        let target = write_target(&mut indices, index)?;
        target.documents.remove(&(doc_type.to_string(), id.to_string()));
        Ok(())
    }

    async fn refresh_index(&self, index: &str) -> Result<()> {
        self.check("refresh_index").await?;
        let indices = self.indices.lock().await;
        if targets(&indices, index).is_empty() {
            return Err(Self::not_found(index));
        }
        Ok(())
    }

    async fn close_index(&self, index: &str) -> Result<()> {
        self.check("close_index").await?;
        let mut indices = self.indices.lock().await;
        let target = indices.get_mut(index).ok_or_else(|| Self::not_found(index))?;
        target.closed = true;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.check("delete_index").await?;
        self.indices
            .lock()
            .await
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(index))
    }

    async fn assign_alias(&self, index: &str, alias: &str) -> Result<()> {
        self.check("assign_alias").await?;
        let mut indices = self.indices.lock().await;
        let target = indices.get_mut(index).ok_or_else(|| Self::not_found(index))?;
        target.aliases.insert(alias.to_string());
        Ok(())
    }

    async fn unassign_alias(&self, index: &str, alias: &str) -> Result<()> {
        self.check("unassign_alias").await?;
        let mut indices = self.indices.lock().await;
        let target = indices.get_mut(index).ok_or_else(|| Self::not_found(index))?;
        if !target.aliases.remove(alias) {
            return Err(SwitchyardError::AliasNotFound {
                alias: alias.to_string(),
            });
        }
        Ok(())
    }

    async fn set_alias(&self, alias: &str, index: &str) -> Result<()> {
        self.check("set_alias").await?;
        let holders: Vec<String> = self
            .alias_table()
            .await?
            .holders(alias)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !holders.iter().any(|h| h == index) {
            self.assign_alias(index, alias).await?;
        }
        for stale in holders.iter().filter(|h| *h != index) {
            self.unassign_alias(stale, alias).await?;
        }
        Ok(())
    }

    async fn alias_table(&self) -> Result<AliasTable> {
        self.check("alias_table").await?;
        let indices = self.indices.lock().await;
        Ok(AliasTable::new(
            indices
                .iter()
                .map(|(name, i)| (name.clone(), i.aliases.clone()))
                .collect(),
        ))
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool> {
        self.check("alias_exists").await?;
        let indices = self.indices.lock().await;
        Ok(indices.values().any(|i| i.aliases.contains(alias)))
    }

    /// Returns every document in the addressed indices, honouring `from`/`size`.
    /// The query clause itself is ignored.
    async fn search(&self, index: &str, query: &Value) -> Result<Value> {
        self.check("search").await?;
        let indices = self.indices.lock().await;
        let names = targets(&indices, index);
        if names.is_empty() {
            return Err(Self::not_found(index));
        }
        let mut hits = Vec::new();
        for name in &names {
            if let Some(i) = indices.get(name) {
                for ((doc_type, id), fields) in &i.documents {
                    hits.push(json!({
                        "_index": name,
                        "_type": doc_type,
                        "_id": id,
                        "_source": fields,
                    }));
                }
            }
        }
        let total = hits.len();
        let from = query.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = query.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let page: Vec<Value> = hits.into_iter().skip(from).take(size).collect();
        Ok(json!({ "took": 0, "hits": { "total": total, "hits": page } }))
    }
}
