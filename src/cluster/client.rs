use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::ClusterBackend;
use crate::config::ClientConfig;
use crate::error::{Result, SwitchyardError};
use crate::policy::VersionPolicy;
use crate::types::{AliasTable, BulkItemFailure, BulkResponse, Document, DocumentFields};

/// Raw answer from the engine: HTTP status plus parsed body.
#[derive(Debug)]
struct EngineResponse {
    status: u16,
    body: Value,
}

impl EngineResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn mentions(&self, needle: &str) -> bool {
        self.body.to_string().contains(needle)
    }

    fn index_already_exists(&self) -> bool {
        self.status == 400 && (self.mentions("already_exists") || self.mentions("AlreadyExists"))
    }
}

/// A persistent HTTP connection to one search-engine cluster.
///
/// Safe for concurrent use; `reqwest::Client` pools connections internally.
/// Obtain instances through `ClusterPool` so each (host, port) is shared.
pub struct ClusterClient {
    name: String,
    base_url: Url,
    http: reqwest::Client,
    policy: Arc<dyn VersionPolicy>,
    retries: u32,
}

impl ClusterClient {
    pub fn connect(
        name: &str,
        host: &str,
        port: u16,
        config: &ClientConfig,
        policy: Arc<dyn VersionPolicy>,
    ) -> Result<Self> {
        let base_url = Url::parse(&format!("http://{host}:{port}/")).map_err(|e| {
            SwitchyardError::Config(format!("invalid cluster address {host}:{port}: {e}"))
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| SwitchyardError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            name: name.to_string(),
            base_url,
            http,
            policy,
            retries: config.retries,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SwitchyardError::Config(format!("cluster url {} cannot be a base", self.base_url)))?
            .clear()
            .extend(segments);
        Ok(url)
    }

    fn transport_error(&self, e: reqwest::Error) -> SwitchyardError {
        SwitchyardError::TransportFailure {
            cluster: self.name.clone(),
            message: e.to_string(),
        }
    }

    fn engine_error(&self, response: &EngineResponse) -> SwitchyardError {
        SwitchyardError::EngineError {
            cluster: self.name.clone(),
            status: response.status,
            body: response.body.to_string(),
        }
    }

    /// Send one request, retrying transport-level failures up to the
    /// configured count. HTTP error statuses are returned, not retried.
    async fn execute<F>(&self, operation: &'static str, build: F) -> Result<EngineResponse>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    {
        let start = Instant::now();
        let mut attempt = 0u32;
        let result = loop {
            match build(&self.http).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let bytes = match resp.bytes().await {
                        Ok(b) => b,
                        Err(e) => break Err(self.transport_error(e)),
                    };
                    let body = if bytes.is_empty() {
                        Value::Null
                    } else {
                        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                            Value::String(String::from_utf8_lossy(&bytes).into_owned())
                        })
                    };
                    break Ok(EngineResponse { status, body });
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    crate::metrics::TRANSPORT_RETRIES_TOTAL
                        .with_label_values(&[&self.name])
                        .inc();
                    warn!(cluster = %self.name, operation, attempt, error = %e, "transport failure, retrying");
                    tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
                }
                Err(e) => break Err(self.transport_error(e)),
            }
        };

        let elapsed = start.elapsed();
        crate::metrics::CLUSTER_OPERATION_DURATION
            .with_label_values(&[&self.name, operation])
            .observe(elapsed.as_secs_f64());
        match &result {
            Ok(resp) => {
                if !resp.is_success() {
                    crate::metrics::CLUSTER_ERRORS_TOTAL
                        .with_label_values(&[&self.name, operation])
                        .inc();
                }
                debug!(
                    cluster = %self.name,
                    operation,
                    status = resp.status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "engine request"
                );
            }
            Err(_) => {
                crate::metrics::CLUSTER_ERRORS_TOTAL
                    .with_label_values(&[&self.name, operation])
                    .inc();
            }
        }
        result
    }

    async fn admin(&self, operation: &'static str, method: Method, index: &str, action: Option<&str>) -> Result<()> {
        let url = match action {
            Some(action) => self.url(&[index, action])?,
            None => self.url(&[index])?,
        };
        let resp = self
            .execute(operation, |http| http.request(method.clone(), url.clone()))
            .await?;
        if resp.status == 404 {
            return Err(SwitchyardError::IndexNotFound {
                index: index.to_string(),
            });
        }
        if !resp.is_success() {
            return Err(self.engine_error(&resp));
        }
        Ok(())
    }

    async fn alias_actions(&self, operation: &'static str, actions: Value) -> Result<()> {
        let url = self.url(&["_aliases"])?;
        let body = json!({ "actions": actions });
        let resp = self
            .execute(operation, |http| http.post(url.clone()).json(&body))
            .await?;
        if resp.status == 404 {
            return Err(SwitchyardError::IndexNotFound {
                index: describe_alias_targets(&body),
            });
        }
        if !resp.is_success() {
            return Err(self.engine_error(&resp));
        }
        Ok(())
    }
}

fn describe_alias_targets(body: &Value) -> String {
    body["actions"]
        .as_array()
        .map(|actions| {
            actions
                .iter()
                .filter_map(|a| a.as_object()?.values().next()?.get("index")?.as_str())
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}

/// Newline-delimited bulk body: one action line plus one source line per document.
pub(crate) fn bulk_body(index: &str, doc_type: &str, documents: &[Document]) -> Result<String> {
    let mut body = String::new();
    for doc in documents {
        let action = json!({ "index": { "_index": index, "_type": doc_type, "_id": doc.id } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&doc.fields)?);
        body.push('\n');
    }
    Ok(body)
}

/// Check every bulk item against the policy; collect the rejected ones.
pub(crate) fn bulk_failures(
    policy: &dyn VersionPolicy,
    response: &Value,
    documents: &[Document],
) -> Vec<BulkItemFailure> {
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut failures = Vec::new();
    for (position, item) in items.iter().enumerate() {
        let entry = item
            .as_object()
            .and_then(|o| o.values().next())
            .unwrap_or(&Value::Null);
        if policy.operation_successful_on_bulk_item(entry) {
            continue;
        }
        let id = entry
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| documents.get(position).map(|d| d.id.clone()))
            .unwrap_or_default();
        let status = entry
            .get("status")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u16;
        let error = entry.get("error").map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        failures.push(BulkItemFailure {
            position,
            id,
            status,
            error,
        });
    }
    failures
}

#[async_trait]
impl ClusterBackend for ClusterClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, mappings, settings), fields(cluster = %self.name))]
    async fn create_index(&self, index: &str, mappings: &Value, settings: &Value) -> Result<Value> {
        let url = self.url(&[index])?;
        let body = json!({ "settings": settings, "mappings": mappings });
        let resp = self
            .execute("create_index", |http| http.put(url.clone()).json(&body))
            .await?;
        if resp.index_already_exists() {
            return Err(SwitchyardError::IndexAlreadyExists {
                index: index.to_string(),
            });
        }
        if !self.policy.create_successful(&resp.body) {
            return Err(SwitchyardError::CreateFailed {
                index: index.to_string(),
                response: resp.body.to_string(),
            });
        }
        Ok(resp.body)
    }

    #[instrument(skip(self, document), fields(cluster = %self.name, doc_type = %document.doc_type, id = %document.id))]
    async fn store_document(&self, index: &str, document: &Document) -> Result<Value> {
        let url = self.url(&[index, &document.doc_type, &document.id])?;
        let resp = self
            .execute("store_document", |http| http.put(url.clone()).json(&document.fields))
            .await?;
        if !self.policy.store_successful(&resp.body) {
            return Err(SwitchyardError::StoreFailed {
                index: index.to_string(),
                doc_type: document.doc_type.clone(),
                id: document.id.clone(),
                response: resp.body.to_string(),
            });
        }
        Ok(resp.body)
    }

    #[instrument(skip(self, fields), fields(cluster = %self.name))]
    async fn update_document(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        fields: &DocumentFields,
    ) -> Result<Value> {
        let url = self.url(&[index, doc_type, id, "_update"])?;
        let body = json!({ "doc": fields });
        let resp = self
            .execute("update_document", |http| http.post(url.clone()).json(&body))
            .await?;
        if resp.status == 404 {
            return Err(SwitchyardError::DocumentNotFound {
                index: index.to_string(),
                doc_type: doc_type.to_string(),
                id: id.to_string(),
            });
        }
        if !self.policy.update_successful(&resp.body) {
            return Err(SwitchyardError::UpdateFailed {
                index: index.to_string(),
                doc_type: doc_type.to_string(),
                id: id.to_string(),
                response: resp.body.to_string(),
            });
        }
        Ok(resp.body)
    }

    #[instrument(skip(self, documents), fields(cluster = %self.name, count = documents.len()))]
    async fn bulk_store(
        &self,
        index: &str,
        doc_type: &str,
        documents: &[Document],
    ) -> Result<BulkResponse> {
        if documents.is_empty() {
            return Ok(BulkResponse {
                index: index.to_string(),
                stored: 0,
                took_ms: 0,
            });
        }

        let url = self.url(&["_bulk"])?;
        let body = bulk_body(index, doc_type, documents)?;
        let resp = self
            .execute("bulk_store", |http| {
                http.post(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                    .body(body.clone())
            })
            .await?;
        if !resp.is_success() || resp.body.get("items").is_none() {
            return Err(self.engine_error(&resp));
        }

        let failures = bulk_failures(self.policy.as_ref(), &resp.body, documents);
        if !failures.is_empty() {
            warn!(
                cluster = %self.name,
                index,
                failed = failures.len(),
                total = documents.len(),
                "bulk store partially failed"
            );
            return Err(SwitchyardError::BulkStoreFailed {
                index: index.to_string(),
                failures,
            });
        }

        Ok(BulkResponse {
            index: index.to_string(),
            stored: documents.len(),
            took_ms: resp.body.get("took").and_then(Value::as_u64).unwrap_or(0),
        })
    }

    #[instrument(skip(self), fields(cluster = %self.name))]
    async fn delete_document(&self, index: &str, doc_type: &str, id: &str) -> Result<()> {
        let url = self.url(&[index, doc_type, id])?;
        let resp = self
            .execute("delete_document", |http| http.delete(url.clone()))
            .await?;
        // Deleting something that is already gone is success.
        if resp.is_success() || resp.status == 404 {
            return Ok(());
        }
        Err(self.engine_error(&resp))
    }

    #[instrument(skip(self), fields(cluster = %self.name))]
    async fn refresh_index(&self, index: &str) -> Result<()> {
        self.admin("refresh_index", Method::POST, index, Some("_refresh"))
            .await
    }

    #[instrument(skip(self), fields(cluster = %self.name))]
    async fn close_index(&self, index: &str) -> Result<()> {
        self.admin("close_index", Method::POST, index, Some("_close"))
            .await
    }

    #[instrument(skip(self), fields(cluster = %self.name))]
    async fn delete_index(&self, index: &str) -> Result<()> {
        self.admin("delete_index", Method::DELETE, index, None).await
    }

    #[instrument(skip(self), fields(cluster = %self.name))]
    async fn assign_alias(&self, index: &str, alias: &str) -> Result<()> {
        self.alias_actions(
            "assign_alias",
            json!([{ "add": { "index": index, "alias": alias } }]),
        )
        .await
    }

    #[instrument(skip(self), fields(cluster = %self.name))]
    async fn unassign_alias(&self, index: &str, alias: &str) -> Result<()> {
        self.alias_actions(
            "unassign_alias",
            json!([{ "remove": { "index": index, "alias": alias } }]),
        )
        .await
    }

    /// Point `alias` at `index` alone.
    ///
    /// The new edge is added before stale edges are removed, so an
    /// interruption leaves the alias on several generations, never on none.
    /// The calls are not transactional.
    #[instrument(skip(self), fields(cluster = %self.name))]
    async fn set_alias(&self, alias: &str, index: &str) -> Result<()> {
        let table = self.alias_table().await?;
        let holders: Vec<String> = table
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
        debug!(cluster = %self.name, alias, index, unassigned = holders.len(), "alias set");
        Ok(())
    }

    #[instrument(skip(self), fields(cluster = %self.name))]
    async fn alias_table(&self) -> Result<AliasTable> {
        let url = self.url(&["_aliases"])?;
        let resp = self
            .execute("alias_table", |http| http.get(url.clone()))
            .await?;
        if !resp.is_success() {
            return Err(self.engine_error(&resp));
        }
        Ok(AliasTable::from_response(&resp.body))
    }

    #[instrument(skip(self), fields(cluster = %self.name))]
    async fn alias_exists(&self, alias: &str) -> Result<bool> {
        let url = self.url(&["_alias", alias])?;
        let resp = self
            .execute("alias_exists", |http| http.head(url.clone()))
            .await?;
        match resp.status {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(self.engine_error(&resp)),
        }
    }

    #[instrument(skip(self, query), fields(cluster = %self.name))]
    async fn search(&self, index: &str, query: &Value) -> Result<Value> {
        let start = Instant::now();
        let url = self.url(&[index, "_search"])?;
        let resp = self
            .execute("search", |http| http.post(url.clone()).json(query))
            .await?;
        let elapsed = start.elapsed();
        crate::metrics::SEARCH_DURATION
            .with_label_values(&[index])
            .observe(elapsed.as_secs_f64());
        debug!(cluster = %self.name, index, elapsed_ms = elapsed.as_millis() as u64, "search");

        if resp.status == 404 {
            return Err(SwitchyardError::IndexNotFound {
                index: index.to_string(),
            });
        }
        if !resp.is_success() {
            return Err(self.engine_error(&resp));
        }
        Ok(resp.body)
    }
}
