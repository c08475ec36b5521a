use crate::error::{Result, SwitchyardError};
use crate::policy::EngineVersion;
use crate::types::ClusterRole;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default = "default_clusters")]
    pub clusters: Vec<ClusterConfig>,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub families: Vec<FamilyConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_request_body_mb")]
    pub max_request_body_mb: usize,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

/// Connection settings shared by every cluster client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_client_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Extra attempts after a transport-level failure.
    #[serde(default = "default_client_retries")]
    pub retries: u32,
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub version: EngineVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_cluster_port")]
    pub port: u16,
    pub role: ClusterRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Environment suffix appended to family names to form aliases
    /// (`products` + `prod` → `products_prod`).
    #[serde(default)]
    pub alias_suffix: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyConfig {
    pub name: String,
    /// Index settings sent verbatim on generation create.
    #[serde(default)]
    pub settings: Option<Value>,
    #[serde(default)]
    pub document_types: Vec<DocumentTypeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTypeConfig {
    pub name: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Field name → engine schema definition.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_host() -> String {
    std::env::var("SWITCHYARD_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}
fn default_port() -> u16 {
    std::env::var("SWITCHYARD_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}
fn default_request_timeout() -> u64 {
    std::env::var("SWITCHYARD_REQUEST_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30)
}
fn default_max_request_body_mb() -> usize {
    50
}
fn default_shutdown_timeout_secs() -> u64 {
    5
}
fn default_client_timeout() -> u64 {
    std::env::var("SWITCHYARD_CLIENT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10)
}
fn default_client_connect_timeout() -> u64 {
    5
}
fn default_client_retries() -> u32 {
    std::env::var("SWITCHYARD_CLIENT_RETRIES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2)
}
fn default_pool_max_idle_per_host() -> usize {
    16
}
fn default_cluster_port() -> u16 {
    9200
}
fn default_clusters() -> Vec<ClusterConfig> {
    vec![ClusterConfig {
        name: "primary".to_string(),
        host: "localhost".to_string(),
        port: default_cluster_port(),
        role: ClusterRole::Critical,
    }]
}
fn default_batch_size() -> usize {
    500
}
fn default_id_field() -> String {
    "id".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    std::env::var("SWITCHYARD_LOG_FORMAT").unwrap_or_else(|_| "json".to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            engine: EngineConfig::default(),
            clusters: default_clusters(),
            indexing: IndexingConfig::default(),
            families: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_request_body_mb: default_max_request_body_mb(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_client_timeout(),
            connect_timeout_secs: default_client_connect_timeout(),
            retries: default_client_retries(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            alias_suffix: std::env::var("SWITCHYARD_ALIAS_SUFFIX")
                .ok()
                .filter(|s| !s.is_empty()),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl IndexingConfig {
    /// Public alias for a family name.
    pub fn alias_for(&self, family: &str) -> String {
        match self.alias_suffix.as_deref() {
            Some(suffix) if !suffix.is_empty() => format!("{family}_{suffix}"),
            _ => family.to_string(),
        }
    }
}

impl Config {
    /// Load config from a TOML file, falling back to defaults.
    /// Precedence: env var > TOML file > defaults. The result is validated.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    SwitchyardError::Config(format!("failed to read config file {p}: {e}"))
                })?;
                Self::from_toml(&content)?
            }
            None => Config::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SwitchyardError::Config(format!("failed to parse config: {e}")))
    }

    /// Apply environment variable overrides on top of file/default values.
    fn apply_env_overrides(&mut self) -> Result<()> {
        // Server
        if let Ok(v) = std::env::var("SWITCHYARD_HOST") {
            self.server.host = v;
        }
        if let Some(v) = std::env::var("SWITCHYARD_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.server.port = v;
        }
        if let Some(v) = std::env::var("SWITCHYARD_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.server.request_timeout_secs = v;
        }

        // Client
        if let Some(v) = std::env::var("SWITCHYARD_CLIENT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.client.timeout_secs = v;
        }
        if let Some(v) = std::env::var("SWITCHYARD_CLIENT_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.client.retries = v;
        }

        // Engine
        if let Ok(v) = std::env::var("SWITCHYARD_ENGINE_VERSION") {
            self.engine.version = v.parse().map_err(SwitchyardError::Config)?;
        }

        // Clusters
        if let Some(v) = std::env::var("SWITCHYARD_CLUSTERS")
            .ok()
            .filter(|s| !s.is_empty())
        {
            self.clusters = parse_cluster_list(&v)?;
        }

        // Indexing
        if let Some(v) = std::env::var("SWITCHYARD_ALIAS_SUFFIX")
            .ok()
            .filter(|s| !s.is_empty())
        {
            self.indexing.alias_suffix = Some(v);
        }

        // Logging
        if let Ok(v) = std::env::var("SWITCHYARD_LOG_FORMAT") {
            self.logging.format = v;
        }
        Ok(())
    }

    /// Reject configurations the fan-out and lifecycle cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self
            .clusters
            .iter()
            .any(|c| c.role == ClusterRole::Critical)
        {
            return Err(SwitchyardError::Config(
                "at least one critical cluster must be configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for cluster in &self.clusters {
            if !names.insert(cluster.name.as_str()) {
                return Err(SwitchyardError::Config(format!(
                    "duplicate cluster name '{}'",
                    cluster.name
                )));
            }
        }

        if self.indexing.batch_size == 0 {
            return Err(SwitchyardError::Config(
                "indexing.batch_size must be > 0".to_string(),
            ));
        }

        let mut families = HashSet::new();
        for family in &self.families {
            if !is_valid_index_name(&family.name) {
                return Err(SwitchyardError::Config(format!(
                    "invalid family name '{}': must be lowercase alphanumeric, dash or underscore",
                    family.name
                )));
            }
            if !families.insert(family.name.as_str()) {
                return Err(SwitchyardError::Config(format!(
                    "duplicate family '{}'",
                    family.name
                )));
            }
            if family.document_types.is_empty() {
                return Err(SwitchyardError::Config(format!(
                    "family '{}' has no document types",
                    family.name
                )));
            }
        }
        Ok(())
    }
}

/// Parse `role@host:port,role@host:port`. Clusters are named `cluster-<n>`.
pub fn parse_cluster_list(spec: &str) -> Result<Vec<ClusterConfig>> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, entry)| {
            let (role, addr) = entry.split_once('@').ok_or_else(|| {
                SwitchyardError::Config(format!("cluster entry '{entry}' must be role@host:port"))
            })?;
            let role: ClusterRole = role.parse().map_err(SwitchyardError::Config)?;
            let (host, port) = match addr.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse().map_err(|_| {
                        SwitchyardError::Config(format!("invalid port in cluster entry '{entry}'"))
                    })?;
                    (host.to_string(), port)
                }
                None => (addr.to_string(), default_cluster_port()),
            };
            Ok(ClusterConfig {
                name: format!("cluster-{i}"),
                host,
                port,
                role,
            })
        })
        .collect()
}

/// Engine index names: 1-200 chars of `[a-z0-9_-]`, not starting with `_` or `-`.
pub(crate) fn is_valid_index_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 200 {
        return false;
    }
    let bytes = name.as_bytes();
    if bytes[0] == b'_' || bytes[0] == b'-' {
        return false;
    }
    bytes
        .iter()
        .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}
