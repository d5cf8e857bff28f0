//! Node configuration.
//!
//! Handles loading and validation of node configuration from
//! config files and command-line arguments.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tessera_governance::GovernanceConfig;
use tessera_rpc::RpcServerConfig;

/// Node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name
    pub name: String,
    /// Data directory
    pub data_dir: PathBuf,
    /// RPC configuration
    pub rpc: RpcServerConfig,
    /// Governance engine configuration
    pub governance: GovernanceConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Metrics configuration
    pub metrics: MetricsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "tessera-node".to_string(),
            data_dir: PathBuf::from("./data"),
            rpc: RpcServerConfig::default(),
            governance: GovernanceConfig::default(),
            storage: StorageConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from file.
    /// Path is validated to prevent directory traversal attacks.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        check_path(path)?;
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: NodeConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        check_path(path)?;
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    /// Directory holding the governance store.
    pub fn store_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("governance"))
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Node name cannot be empty");
        }

        if self.rpc.max_body_size == 0 {
            anyhow::bail!("RPC max_body_size cannot be 0");
        }
        if self.rpc.max_connections == 0 {
            anyhow::bail!("RPC max_connections cannot be 0");
        }

        self.governance
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid governance config: {}", e))?;

        if self.storage.backend == StorageBackend::Json {
            check_path(&self.store_path())?;
        }

        if self.metrics.enabled && self.metrics.addr == self.rpc.addr {
            anyhow::bail!("Metrics and RPC cannot share address {}", self.rpc.addr);
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!("Unknown log format '{}' (expected pretty or json)", self.logging.format);
        }

        Ok(())
    }
}

fn check_path(path: &Path) -> anyhow::Result<()> {
    if path.to_string_lossy().contains("..") {
        anyhow::bail!("Invalid path: directory traversal detected");
    }
    Ok(())
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Nothing survives a restart
    Memory,
    /// Single JSON file under the store path
    #[default]
    Json,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Store directory (defaults to `<data_dir>/governance`)
    pub path: Option<PathBuf>,
}

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics
    pub enabled: bool,
    /// Metrics server address
    pub addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: SocketAddr::from(([127, 0, 0, 1], 9090)),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive
    pub level: String,
    /// Log to file
    pub log_file: Option<PathBuf>,
    /// Log format (json|pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            format: "pretty".to_string(),
        }
    }
}
