use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::ClusterClient;
use crate::config::{ClientConfig, ClusterConfig};
use crate::error::Result;
use crate::policy::VersionPolicy;

/// Explicit connection pool: one `ClusterClient` per (host, port).
///
/// Built once at startup and handed to whoever needs a client. Clients are
/// created lazily on first request; the `DashMap` entry lock makes concurrent
/// first requests for the same address observe a single client.
pub struct ClusterPool {
    clients: DashMap<(String, u16), Arc<ClusterClient>>,
    client_config: ClientConfig,
    policy: Arc<dyn VersionPolicy>,
}

impl ClusterPool {
    pub fn new(client_config: ClientConfig, policy: Arc<dyn VersionPolicy>) -> Self {
        Self {
            clients: DashMap::new(),
            client_config,
            policy,
        }
    }

    /// Return the shared client for this cluster's address, connecting if needed.
    pub fn client(&self, cluster: &ClusterConfig) -> Result<Arc<ClusterClient>> {
        let key = (cluster.host.clone(), cluster.port);
        if let Some(existing) = self.clients.get(&key) {
            return Ok(existing.clone());
        }

        let entry = self.clients.entry(key);
        let client = match entry {
            dashmap::mapref::entry::Entry::Occupied(occupied) => occupied.get().clone(),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let client = Arc::new(ClusterClient::connect(
                    &cluster.name,
                    &cluster.host,
                    cluster.port,
                    &self.client_config,
                    self.policy.clone(),
                )?);
                info!(
                    cluster = %cluster.name,
                    host = %cluster.host,
                    port = cluster.port,
                    role = %cluster.role,
                    "connected cluster client"
                );
                vacant.insert(client.clone());
                client
            }
        };
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
