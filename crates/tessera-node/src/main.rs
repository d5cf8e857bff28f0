//! Tessera Node - Governance engine daemon.
//!
//! Loads configuration, restores governance state from the store and serves
//! the JSON-RPC API while the deadline scheduler settles closed proposals.

pub mod config;
pub mod metrics;
pub mod node;
pub mod telemetry;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "tessera-node")]
#[command(about = "Tessera Node - Stake-weighted governance voting")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Config file path
    #[arg(short, long, value_name = "FILE", env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// RPC listen address
    #[arg(long)]
    rpc_addr: Option<SocketAddr>,

    /// Storage backend (memory|json)
    #[arg(long, value_parser = parse_backend)]
    storage: Option<config::StorageBackend>,

    /// Scheduler tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Enable metrics
    #[arg(long)]
    metrics: bool,

    /// Metrics listen address
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

fn parse_backend(s: &str) -> Result<config::StorageBackend, String> {
    match s {
        "memory" => Ok(config::StorageBackend::Memory),
        "json" => Ok(config::StorageBackend::Json),
        other => Err(format!("unknown storage backend '{}'", other)),
    }
}

impl Args {
    /// Apply CLI overrides on top of the file configuration.
    fn apply(&self, config: &mut config::NodeConfig) {
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(addr) = self.rpc_addr {
            config.rpc.addr = addr;
        }
        if let Some(backend) = self.storage {
            config.storage.backend = backend;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.governance.scheduler.tick_interval_ms = tick_ms;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.format = "json".to_string();
        }
        if self.metrics {
            config.metrics.enabled = true;
        }
        if let Some(addr) = self.metrics_addr {
            config.metrics.addr = addr;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::NodeConfig::from_file(path)?,
        None => config::NodeConfig::default(),
    };
    args.apply(&mut config);

    telemetry::init(&config.logging)?;

    match &args.config {
        Some(path) => info!("Loaded configuration from: {:?}", path),
        None => info!("Using default configuration"),
    }

    config.validate()?;

    info!("Configuration:");
    info!("  Name: {}", config.name);
    info!("  Data dir: {:?}", config.data_dir);
    info!("  Storage: {:?}", config.storage.backend);
    info!("  RPC addr: {}", config.rpc.addr);
    info!("  Scheduler tick: {} ms", config.governance.scheduler.tick_interval_ms);
    info!("  Metrics: {}", config.metrics.enabled);

    let (mut node, _shutdown) = node::TesseraNode::new(config).await?;

    if let Err(e) = node.start().await {
        error!("Failed to start node: {}", e);
        return Err(e);
    }

    if let Err(e) = node.run().await {
        error!("Node error: {}", e);
        return Err(e);
    }

    info!("Tessera node shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args() {
        let args = Args::parse_from([
            "tessera-node",
            "--rpc-addr", "0.0.0.0:9000",
            "--storage", "memory",
            "--tick-ms", "250",
            "--metrics",
        ]);

        let mut config = config::NodeConfig::default();
        args.apply(&mut config);

        assert_eq!(config.rpc.addr.port(), 9000);
        assert_eq!(config.storage.backend, config::StorageBackend::Memory);
        assert_eq!(config.governance.scheduler.tick_interval_ms, 250);
        assert!(config.metrics.enabled);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Args::try_parse_from(["tessera-node", "--storage", "rocks"]).is_err());
    }
}
