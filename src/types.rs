use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Field name → value, kept in key order so serialized documents are stable.
pub type DocumentFields = BTreeMap<String, Value>;

/// An indexable document: typed, identified, and otherwise opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier within its document type.
    pub id: String,
    /// Document type (schema partition) this document belongs to.
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Source fields sent to the engine.
    pub fields: DocumentFields,
}

impl Document {
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>, fields: DocumentFields) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            fields,
        }
    }
}

/// How a cluster's failures are treated by the fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterRole {
    /// Failures abort the operation and propagate to the caller.
    Critical,
    /// Failures are logged and reported, never propagated.
    Dispensable,
}

impl std::fmt::Display for ClusterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterRole::Critical => write!(f, "critical"),
            ClusterRole::Dispensable => write!(f, "dispensable"),
        }
    }
}

impl std::str::FromStr for ClusterRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(ClusterRole::Critical),
            "dispensable" => Ok(ClusterRole::Dispensable),
            other => Err(format!("unknown cluster role '{other}'")),
        }
    }
}

/// One rejected entry of a bulk write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemFailure {
    /// Zero-based position of the document in the submitted batch.
    pub position: usize,
    pub id: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a fully successful bulk write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub index: String,
    pub stored: usize,
    pub took_ms: u64,
}

/// Snapshot of the engine's alias metadata: index name → aliases it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    indices: BTreeMap<String, BTreeSet<String>>,
}

impl AliasTable {
    pub fn new(indices: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { indices }
    }

    /// Parse a `GET /_aliases` body: `{ "<index>": { "aliases": { "<alias>": {} } } }`.
    pub fn from_response(body: &Value) -> Self {
        let mut indices = BTreeMap::new();
        if let Some(map) = body.as_object() {
            for (index, meta) in map {
                let aliases = meta
                    .get("aliases")
                    .and_then(Value::as_object)
                    .map(|a| a.keys().cloned().collect())
                    .unwrap_or_default();
                indices.insert(index.clone(), aliases);
            }
        }
        Self { indices }
    }

    /// First index (in name order) holding `alias`.
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.indices
            .iter()
            .find(|(_, aliases)| aliases.contains(alias))
            .map(|(index, _)| index.as_str())
    }

    /// Every index holding `alias`. More than one means an interrupted swap.
    pub fn holders(&self, alias: &str) -> Vec<&str> {
        self.indices
            .iter()
            .filter(|(_, aliases)| aliases.contains(alias))
            .map(|(index, _)| index.as_str())
            .collect()
    }

    pub fn generations(&self) -> BTreeSet<String> {
        self.indices.keys().cloned().collect()
    }

    pub fn contains_index(&self, index: &str) -> bool {
        self.indices.contains_key(index)
    }
}
