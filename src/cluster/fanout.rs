use std::sync::Arc;

use tracing::{error, instrument, warn};

use super::{ClusterBackend, ClusterOperation, ClusterPool, OperationOutput};
use crate::config::ClusterConfig;
use crate::error::{Result, SwitchyardError};
use crate::types::ClusterRole;

/// Out-of-band destination for failures absorbed on dispensable clusters.
pub trait ErrorSink: Send + Sync {
    fn report(&self, cluster: &str, operation: &str, error: &SwitchyardError);
}

/// Default sink: an error-level log line plus a counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorSink;

impl ErrorSink for LoggingErrorSink {
    fn report(&self, cluster: &str, operation: &str, error: &SwitchyardError) {
        crate::metrics::DISPENSABLE_FAILURES_TOTAL
            .with_label_values(&[cluster, operation])
            .inc();
        error!(cluster, operation, error = %error, "dispensable cluster operation failed");
    }
}

/// Replicates operations across critical and dispensable clusters.
///
/// Dispensable clusters run first and their failures are reported, never
/// returned. Critical clusters then run in configured order; the first
/// failure stops the fan-out and is returned as-is. The value returned is
/// the last critical cluster's result.
pub struct ClusterFanout {
    critical: Vec<Arc<dyn ClusterBackend>>,
    dispensable: Vec<Arc<dyn ClusterBackend>>,
    sink: Arc<dyn ErrorSink>,
}

impl ClusterFanout {
    pub fn new(
        critical: Vec<Arc<dyn ClusterBackend>>,
        dispensable: Vec<Arc<dyn ClusterBackend>>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            critical,
            dispensable,
            sink,
        }
    }

    /// Build from configured clusters, reusing pooled clients.
    pub fn from_config(
        pool: &ClusterPool,
        clusters: &[ClusterConfig],
        sink: Arc<dyn ErrorSink>,
    ) -> Result<Self> {
        let mut critical: Vec<Arc<dyn ClusterBackend>> = Vec::new();
        let mut dispensable: Vec<Arc<dyn ClusterBackend>> = Vec::new();
        for cluster in clusters {
            let client = pool.client(cluster)?;
            match cluster.role {
                ClusterRole::Critical => critical.push(client),
                ClusterRole::Dispensable => dispensable.push(client),
            }
        }
        Ok(Self::new(critical, dispensable, sink))
    }

    pub fn critical_names(&self) -> Vec<String> {
        self.critical.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn dispensable_names(&self) -> Vec<String> {
        self.dispensable
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Run `operation` on every cluster. `Ok(None)` when no critical cluster exists.
    #[instrument(skip(self, operation), fields(operation = operation.name()))]
    pub async fn invoke(&self, operation: &ClusterOperation) -> Result<Option<OperationOutput>> {
        for cluster in &self.dispensable {
            if let Err(e) = operation.apply(cluster.as_ref()).await {
                self.sink.report(cluster.name(), operation.name(), &e);
            }
        }

        let mut last = None;
        for cluster in &self.critical {
            match operation.apply(cluster.as_ref()).await {
                Ok(output) => last = Some(output),
                Err(e) => {
                    warn!(
                        cluster = cluster.name(),
                        operation = operation.name(),
                        error = %e,
                        "critical cluster operation failed"
                    );
                    return Err(e);
                }
            }
        }
        Ok(last)
    }

    /// Like `invoke`, but a missing critical result is an error.
    pub async fn invoke_required(&self, operation: &ClusterOperation) -> Result<OperationOutput> {
        self.invoke(operation)
            .await?
            .ok_or(SwitchyardError::NoCriticalCluster)
    }

    /// Serve a read-only operation from the representative critical cluster
    /// (the last configured one, whose result `invoke` would return).
    #[instrument(skip(self, operation), fields(operation = operation.name()))]
    pub async fn read(&self, operation: &ClusterOperation) -> Result<OperationOutput> {
        if !operation.is_read() {
            return Err(SwitchyardError::Validation(format!(
                "{} changes cluster state and must be fanned out",
                operation.name()
            )));
        }
        let cluster = self.critical.last().ok_or(SwitchyardError::NoCriticalCluster)?;
        operation.apply(cluster.as_ref()).await
    }

    /// Ping every critical cluster concurrently with an alias-table read.
    /// Results keep the configured order.
    pub async fn ping_critical(&self) -> Vec<(String, Result<()>)> {
        let pings = self.critical.iter().map(|cluster| async move {
            let res = cluster.alias_table().await.map(|_| ());
            (cluster.name().to_string(), res)
        });
        futures::future::join_all(pings).await
    }
}
