//! Document-type schemas and record projection.
//!
//! A `Mapping` declares one document type's searchable schema and how to turn
//! a domain record into a `Document`. Families register their mappings in a
//! `MappingRegistry` at startup; lookups of unregistered families or document
//! types fail immediately instead of at first write.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::{DocumentTypeConfig, FamilyConfig};
use crate::error::{Result, SwitchyardError};
use crate::types::{Document, DocumentFields};

/// Field name → engine schema definition (e.g. `{"type": "string"}`).
pub type FieldDefinitions = BTreeMap<String, Value>;

pub trait Mapping<R>: Send + Sync {
    fn doc_type(&self) -> &str;
    fn definition(&self) -> FieldDefinitions;
    fn document_for(&self, record: &R) -> Result<Document>;
}

/// Config-driven mapping over JSON records.
///
/// The id is read from `id_field` (string or integer). When `fields` is
/// non-empty only declared fields are projected; otherwise every top-level
/// field except the id is kept.
#[derive(Debug, Clone)]
pub struct JsonMapping {
    doc_type: String,
    id_field: String,
    fields: FieldDefinitions,
}

impl JsonMapping {
    pub fn new(doc_type: impl Into<String>, id_field: impl Into<String>, fields: FieldDefinitions) -> Self {
        Self {
            doc_type: doc_type.into(),
            id_field: id_field.into(),
            fields,
        }
    }

    pub fn from_config(config: &DocumentTypeConfig) -> Self {
        Self::new(&config.name, &config.id_field, config.fields.clone())
    }
}

impl Mapping<Value> for JsonMapping {
    fn doc_type(&self) -> &str {
        &self.doc_type
    }

    fn definition(&self) -> FieldDefinitions {
        self.fields.clone()
    }

    fn document_for(&self, record: &Value) -> Result<Document> {
        let obj = record.as_object().ok_or_else(|| {
            SwitchyardError::Mapping(format!("{} record must be a JSON object", self.doc_type))
        })?;
        let id = match obj.get(&self.id_field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(SwitchyardError::Mapping(format!(
                    "{} record is missing a string or integer '{}'",
                    self.doc_type, self.id_field
                )))
            }
        };

        let fields: DocumentFields = if self.fields.is_empty() {
            obj.iter()
                .filter(|(k, _)| **k != self.id_field)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        } else {
            self.fields
                .keys()
                .filter_map(|k| obj.get(k).map(|v| (k.clone(), v.clone())))
                .collect()
        };
        Ok(Document::new(id, &self.doc_type, fields))
    }
}

/// One index family: its settings and document-type bindings.
pub struct FamilyRegistration<R> {
    name: String,
    settings: Value,
    mappings: BTreeMap<String, Arc<dyn Mapping<R>>>,
}

impl<R> FamilyRegistration<R> {
    pub fn new(name: impl Into<String>, settings: Value) -> Self {
        Self {
            name: name.into(),
            settings,
            mappings: BTreeMap::new(),
        }
    }

    pub fn with_mapping(mut self, mapping: Arc<dyn Mapping<R>>) -> Self {
        self.mappings.insert(mapping.doc_type().to_string(), mapping);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Value {
        &self.settings
    }

    pub fn doc_types(&self) -> impl Iterator<Item = &str> {
        self.mappings.keys().map(String::as_str)
    }

    pub fn mapping(&self, doc_type: &str) -> Result<&Arc<dyn Mapping<R>>> {
        self.mappings
            .get(doc_type)
            .ok_or_else(|| SwitchyardError::UnknownDocumentType {
                family: self.name.clone(),
                doc_type: doc_type.to_string(),
            })
    }

    /// A generation's schema: the union of all registered type definitions,
    /// `{ "<type>": { "properties": { ... } } }`.
    pub fn mappings_body(&self) -> Value {
        let mut body = serde_json::Map::new();
        for (doc_type, mapping) in &self.mappings {
            body.insert(doc_type.clone(), json!({ "properties": mapping.definition() }));
        }
        Value::Object(body)
    }
}

/// Startup-built table from family name to its registration.
pub struct MappingRegistry<R> {
    families: BTreeMap<String, Arc<FamilyRegistration<R>>>,
}

impl<R> Default for MappingRegistry<R> {
    fn default() -> Self {
        Self {
            families: BTreeMap::new(),
        }
    }
}

impl<R> MappingRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, family: FamilyRegistration<R>) -> Result<()> {
        if family.mappings.is_empty() {
            return Err(SwitchyardError::Config(format!(
                "family '{}' registers no document types",
                family.name
            )));
        }
        if self.families.contains_key(&family.name) {
            return Err(SwitchyardError::Config(format!(
                "family '{}' registered twice",
                family.name
            )));
        }
        self.families.insert(family.name.clone(), Arc::new(family));
        Ok(())
    }

    pub fn family(&self, name: &str) -> Result<Arc<FamilyRegistration<R>>> {
        self.families
            .get(name)
            .cloned()
            .ok_or_else(|| SwitchyardError::UnknownFamily {
                family: name.to_string(),
            })
    }

    pub fn families(&self) -> impl Iterator<Item = &Arc<FamilyRegistration<R>>> {
        self.families.values()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

impl MappingRegistry<Value> {
    pub fn from_config(families: &[FamilyConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for family in families {
            let settings = family.settings.clone().unwrap_or_else(|| json!({}));
            let mut registration = FamilyRegistration::new(&family.name, settings);
            for doc_type in &family.document_types {
                registration = registration.with_mapping(Arc::new(JsonMapping::from_config(doc_type)));
            }
            registry.register(registration)?;
        }
        Ok(registry)
    }
}
