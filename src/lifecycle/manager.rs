use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::plan::{
    family_generations, importing_alias, is_generation_of, next_generation_name, plan_cleanup,
    CleanupReport, FamilyStatus, LifecycleState,
};
use super::RebuildOptions;
use crate::cluster::{ClusterFanout, ClusterOperation, OperationOutput};
use crate::error::{Result, SwitchyardError};
use crate::feed::RecordFeed;
use crate::mapping::FamilyRegistration;
use crate::metrics::{GaugeGuard, DOCUMENTS_WRITTEN_TOTAL, IMPORTS_IN_PROGRESS, LIFECYCLE_TRANSITIONS_TOTAL};
use crate::query::{QueryResultView, SearchQuery};
use crate::types::{AliasTable, BulkResponse, Document, DocumentFields};

/// Outcome of a zero-downtime reindex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub generation: String,
    pub imported: usize,
    pub cleanup: CleanupReport,
}

/// Where a live write lands: the generation behind the alias and, during a
/// rebuild, the importing generation that mirrors it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WriteTargets {
    primary: String,
    mirror: Option<String>,
}

/// Drives one index family through create → import → switch → cleanup.
///
/// Holds no lifecycle state of its own: every decision is taken from a fresh
/// read of the engine's alias table, so several processes can share a family.
pub struct IndexLifecycle<R> {
    alias: String,
    importing_alias: String,
    family: Arc<FamilyRegistration<R>>,
    fanout: Arc<ClusterFanout>,
    batch_size: usize,
}

impl<R: Send + Sync + 'static> IndexLifecycle<R> {
    pub fn new(
        alias: impl Into<String>,
        family: Arc<FamilyRegistration<R>>,
        fanout: Arc<ClusterFanout>,
        batch_size: usize,
    ) -> Self {
        let alias = alias.into();
        Self {
            importing_alias: importing_alias(&alias),
            alias,
            family,
            fanout,
            batch_size: batch_size.max(1),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn importing_alias(&self) -> &str {
        &self.importing_alias
    }

    pub fn family(&self) -> &Arc<FamilyRegistration<R>> {
        &self.family
    }

    pub fn fanout(&self) -> &Arc<ClusterFanout> {
        &self.fanout
    }

    pub async fn alias_table(&self) -> Result<AliasTable> {
        self.fanout
            .read(&ClusterOperation::AliasTable)
            .await?
            .into_aliases()
    }

    pub async fn live_generation(&self) -> Result<Option<String>> {
        self.fanout
            .read(&ClusterOperation::ResolveAlias {
                alias: self.alias.clone(),
            })
            .await?
            .into_alias()
    }

    pub async fn importing_generation(&self) -> Result<Option<String>> {
        self.fanout
            .read(&ClusterOperation::ResolveAlias {
                alias: self.importing_alias.clone(),
            })
            .await?
            .into_alias()
    }

    /// Whether the public alias exists, i.e. searches through it can be served.
    pub async fn is_serving(&self) -> Result<bool> {
        self.fanout
            .read(&ClusterOperation::AliasExists {
                alias: self.alias.clone(),
            })
            .await?
            .into_exists()
    }

    /// The family's generations, oldest first.
    pub async fn generations(&self) -> Result<Vec<String>> {
        let table = self.alias_table().await?;
        Ok(family_generations(&self.alias, &table))
    }

    pub async fn status(&self) -> Result<FamilyStatus> {
        let table = self.alias_table().await?;
        Ok(FamilyStatus::from_table(&self.alias, &table))
    }

    pub async fn state(&self) -> Result<LifecycleState> {
        Ok(self.status().await?.state)
    }

    fn record_transition(&self, transition: &str) {
        LIFECYCLE_TRANSITIONS_TOTAL
            .with_label_values(&[self.alias.as_str(), transition])
            .inc();
    }

    fn check_generation(&self, generation: &str) -> Result<()> {
        if !is_generation_of(&self.alias, generation) {
            return Err(SwitchyardError::Validation(format!(
                "'{generation}' is not a generation of '{}'",
                self.alias
            )));
        }
        Ok(())
    }

    /// Create a fresh, empty generation and return its name.
    #[instrument(skip(self), fields(alias = %self.alias))]
    pub async fn create(&self) -> Result<String> {
        let existing = self
            .fanout
            .read(&ClusterOperation::ListGenerations)
            .await?
            .into_generations()?;
        let generation = next_generation_name(&self.alias, &existing, Utc::now());
        self.create_generation(&generation).await?;
        Ok(generation)
    }

    async fn create_generation(&self, generation: &str) -> Result<()> {
        self.fanout
            .invoke(&ClusterOperation::CreateIndex {
                index: generation.to_string(),
                mappings: self.family.mappings_body(),
                settings: self.family.settings().clone(),
            })
            .await?;
        self.record_transition("create");
        info!(alias = %self.alias, generation, "created generation");
        Ok(())
    }

    /// Mark `generation` as the import target; live writes start mirroring into it.
    #[instrument(skip(self), fields(alias = %self.alias))]
    pub async fn import_begin(&self, generation: &str) -> Result<()> {
        self.check_generation(generation)?;
        self.fanout
            .invoke(&ClusterOperation::AssignAlias {
                index: generation.to_string(),
                alias: self.importing_alias.clone(),
            })
            .await?;
        self.record_transition("import_begin");
        info!(alias = %self.alias, generation, "import started");
        Ok(())
    }

    /// Stream `feed` into the importing generation.
    pub async fn import(&self, doc_type: &str, feed: &mut dyn RecordFeed<R>) -> Result<usize> {
        let generation = self
            .importing_generation()
            .await?
            .ok_or_else(|| SwitchyardError::NotImporting {
                alias: self.alias.clone(),
            })?;
        self.import_into(&generation, doc_type, feed).await
    }

    /// Stream `feed` into `generation` in bulk batches. Returns the number of
    /// documents stored.
    #[instrument(skip(self, feed), fields(alias = %self.alias))]
    pub async fn import_into(
        &self,
        generation: &str,
        doc_type: &str,
        feed: &mut dyn RecordFeed<R>,
    ) -> Result<usize> {
        let mapping = self.family.mapping(doc_type)?.clone();
        IMPORTS_IN_PROGRESS.inc();
        let _guard = GaugeGuard(&IMPORTS_IN_PROGRESS);

        let mut imported = 0usize;
        while let Some(records) = feed.next_batch().await? {
            let documents = records
                .iter()
                .map(|r| mapping.document_for(r))
                .collect::<Result<Vec<Document>>>()?;
            for chunk in documents.chunks(self.batch_size) {
                self.fanout
                    .invoke(&ClusterOperation::BulkStore {
                        index: generation.to_string(),
                        doc_type: doc_type.to_string(),
                        documents: chunk.to_vec(),
                    })
                    .await?;
                imported += chunk.len();
                debug!(alias = %self.alias, generation, imported, "import batch stored");
            }
        }

        DOCUMENTS_WRITTEN_TOTAL
            .with_label_values(&[self.alias.as_str(), "import"])
            .inc_by(imported as u64);
        info!(alias = %self.alias, generation, doc_type, imported, "import finished");
        Ok(imported)
    }

    /// Point the alias at `generation` and end any import in progress.
    #[instrument(skip(self), fields(alias = %self.alias))]
    pub async fn switch_alias(&self, generation: &str) -> Result<()> {
        self.check_generation(generation)?;
        if !self.alias_table().await?.contains_index(generation) {
            return Err(SwitchyardError::IndexNotFound {
                index: generation.to_string(),
            });
        }

        self.fanout
            .invoke(&ClusterOperation::SetAlias {
                alias: self.alias.clone(),
                index: generation.to_string(),
            })
            .await?;

        let table = self.alias_table().await?;
        for holder in table.holders(&self.importing_alias) {
            self.fanout
                .invoke(&ClusterOperation::UnassignAlias {
                    index: holder.to_string(),
                    alias: self.importing_alias.clone(),
                })
                .await?;
        }

        self.record_transition("switch");
        info!(alias = %self.alias, generation, "alias switched");
        Ok(())
    }

    /// Delete all but the two newest generations and close the older survivor.
    #[instrument(skip(self), fields(alias = %self.alias))]
    pub async fn cleanup_old_indices(&self) -> Result<CleanupReport> {
        let table = self.alias_table().await?;
        let report = plan_cleanup(&self.alias, &table);

        for generation in &report.protected {
            warn!(alias = %self.alias, generation, "generation still aliased, not cleaned up");
        }
        for generation in &report.deleted {
            self.fanout
                .invoke(&ClusterOperation::DropIndex {
                    index: generation.clone(),
                })
                .await?;
        }
        if let Some(generation) = &report.closed {
            self.fanout
                .invoke(&ClusterOperation::CloseIndex {
                    index: generation.clone(),
                })
                .await?;
        }

        self.record_transition("cleanup");
        info!(
            alias = %self.alias,
            deleted = report.deleted.len(),
            closed = report.closed.is_some(),
            "old generations cleaned up"
        );
        Ok(report)
    }

    /// Recreate the generation the alias points at (or a fresh one) from scratch.
    ///
    /// Not zero-downtime: the live generation is dropped first. Meant for
    /// recovery and non-production environments; use `reindex` otherwise.
    #[instrument(skip(self, options), fields(alias = %self.alias))]
    pub async fn rebuild(&self, options: RebuildOptions<R>) -> Result<String> {
        let table = self.alias_table().await?;
        let generation = match table.resolve(&self.alias) {
            Some(live) => live.to_string(),
            None => next_generation_name(&self.alias, &table.generations(), Utc::now()),
        };

        self.drop_generation(&generation).await?;
        match self.create_generation(&generation).await {
            Err(SwitchyardError::IndexAlreadyExists { .. }) => {
                warn!(alias = %self.alias, generation, "generation reappeared, retrying create");
                self.drop_generation(&generation).await?;
                self.create_generation(&generation).await?;
            }
            other => other?,
        }

        if options.switch {
            self.switch_alias(&generation).await?;
        }
        if let Some(import) = options.import {
            let mut feed = import.feed;
            self.import_into(&generation, &import.doc_type, feed.as_mut())
                .await?;
            self.refresh_generation(&generation).await?;
        }

        self.record_transition("rebuild");
        info!(alias = %self.alias, generation, switched = options.switch, "rebuilt generation");
        Ok(generation)
    }

    async fn drop_generation(&self, generation: &str) -> Result<()> {
        self.fanout
            .invoke(&ClusterOperation::DropIndex {
                index: generation.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Zero-downtime rebuild: create, import while mirroring live writes,
    /// switch, clean up.
    #[instrument(skip(self, feed), fields(alias = %self.alias))]
    pub async fn reindex(&self, doc_type: &str, feed: &mut dyn RecordFeed<R>) -> Result<ReindexReport> {
        self.family.mapping(doc_type)?;
        let generation = self.create().await?;
        self.import_begin(&generation).await?;

        let imported = match self.import_into(&generation, doc_type, feed).await {
            Ok(n) => n,
            Err(e) => {
                warn!(alias = %self.alias, generation, error = %e, "import failed, abandoning generation");
                let abandon = ClusterOperation::UnassignAlias {
                    index: generation.clone(),
                    alias: self.importing_alias.clone(),
                };
                if let Err(unassign) = self.fanout.invoke(&abandon).await {
                    warn!(alias = %self.alias, generation, error = %unassign, "could not clear importing alias");
                }
                return Err(e);
            }
        };

        self.refresh_generation(&generation).await?;
        self.switch_alias(&generation).await?;
        let cleanup = self.cleanup_old_indices().await?;
        Ok(ReindexReport {
            generation,
            imported,
            cleanup,
        })
    }

    /// Make recent writes searchable on the live and importing generations.
    pub async fn refresh(&self) -> Result<()> {
        let targets = self.write_targets().await?;
        self.refresh_generation(&targets.primary).await?;
        if let Some(mirror) = &targets.mirror {
            self.refresh_generation(mirror).await?;
        }
        Ok(())
    }

    pub async fn refresh_generation(&self, generation: &str) -> Result<()> {
        self.fanout
            .invoke(&ClusterOperation::RefreshIndex {
                index: generation.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Resolve write targets from one alias-table read. Never cached: an
    /// import that starts or ends between two writes is picked up by the second.
    async fn write_targets(&self) -> Result<WriteTargets> {
        let table = self.alias_table().await?;
        let live = table.resolve(&self.alias).map(str::to_string);
        let importing = table.resolve(&self.importing_alias).map(str::to_string);
        match (live, importing) {
            (Some(live), importing) => Ok(WriteTargets {
                mirror: importing.filter(|i| *i != live),
                primary: live,
            }),
            // First build: nothing is live yet, so the import target takes writes.
            (None, Some(importing)) => Ok(WriteTargets {
                primary: importing,
                mirror: None,
            }),
            (None, None) => Err(SwitchyardError::AliasNotFound {
                alias: self.alias.clone(),
            }),
        }
    }

    /// Apply a write to the primary target, then mirror it to the importing
    /// generation. A mirrored update of a document the import has not
    /// reached yet is skipped; the import will carry the fresh copy.
    async fn write_through<F>(&self, operation: &'static str, documents: u64, build: F) -> Result<OperationOutput>
    where
        F: Fn(String) -> ClusterOperation,
    {
        let targets = self.write_targets().await?;
        let output = self.fanout.invoke_required(&build(targets.primary.clone())).await?;
        DOCUMENTS_WRITTEN_TOTAL
            .with_label_values(&[self.alias.as_str(), "live"])
            .inc_by(documents);

        if let Some(mirror) = targets.mirror {
            match self.fanout.invoke(&build(mirror.clone())).await {
                Ok(_) => {
                    DOCUMENTS_WRITTEN_TOTAL
                        .with_label_values(&[self.alias.as_str(), "importing"])
                        .inc_by(documents);
                }
                Err(SwitchyardError::DocumentNotFound { id, .. }) => {
                    debug!(alias = %self.alias, generation = %mirror, id = %id, operation, "mirror target lacks document");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(output)
    }

    /// Map `record` through its document type and store it.
    pub async fn store(&self, doc_type: &str, record: &R) -> Result<Document> {
        let document = self.family.mapping(doc_type)?.document_for(record)?;
        self.store_document(document.clone()).await?;
        Ok(document)
    }

    #[instrument(skip(self, document), fields(alias = %self.alias, doc_type = %document.doc_type, id = %document.id))]
    pub async fn store_document(&self, document: Document) -> Result<()> {
        self.family.mapping(&document.doc_type)?;
        self.write_through("store", 1, |index| ClusterOperation::StoreDocument {
            index,
            document: document.clone(),
        })
        .await?;
        Ok(())
    }

    pub async fn bulk_store(&self, doc_type: &str, records: &[R]) -> Result<BulkResponse> {
        let mapping = self.family.mapping(doc_type)?;
        let documents = records
            .iter()
            .map(|r| mapping.document_for(r))
            .collect::<Result<Vec<Document>>>()?;
        self.bulk_store_documents(doc_type, documents).await
    }

    #[instrument(skip(self, documents), fields(alias = %self.alias, count = documents.len()))]
    pub async fn bulk_store_documents(&self, doc_type: &str, documents: Vec<Document>) -> Result<BulkResponse> {
        self.family.mapping(doc_type)?;
        let count = documents.len() as u64;
        let output = self
            .write_through("bulk_store", count, |index| ClusterOperation::BulkStore {
                index,
                doc_type: doc_type.to_string(),
                documents: documents.clone(),
            })
            .await?;
        match output {
            OperationOutput::Bulk(response) => Ok(response),
            other => Err(SwitchyardError::Validation(format!(
                "expected bulk output, got {other:?}"
            ))),
        }
    }

    /// Partially update a stored document.
    #[instrument(skip(self, fields), fields(alias = %self.alias))]
    pub async fn update(&self, doc_type: &str, id: &str, fields: DocumentFields) -> Result<()> {
        self.family.mapping(doc_type)?;
        self.write_through("update", 1, |index| ClusterOperation::UpdateDocument {
            index,
            doc_type: doc_type.to_string(),
            id: id.to_string(),
            fields: fields.clone(),
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(alias = %self.alias))]
    pub async fn delete_by_id(&self, doc_type: &str, id: &str) -> Result<()> {
        self.family.mapping(doc_type)?;
        self.write_through("delete", 1, |index| ClusterOperation::DeleteDocument {
            index,
            doc_type: doc_type.to_string(),
            id: id.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Search through the alias on the representative critical cluster.
    #[instrument(skip(self, query), fields(alias = %self.alias))]
    pub async fn search(&self, query: SearchQuery) -> Result<QueryResultView> {
        let response = self
            .fanout
            .read(&ClusterOperation::Search {
                index: self.alias.clone(),
                query: query.to_body(),
            })
            .await?
            .into_search()?;
        Ok(QueryResultView::new(query, response))
    }
}
