//! Governance node implementation.

use crate::config::{NodeConfig, StorageBackend};
use crate::metrics::{Metrics, MetricsServer};
use std::sync::Arc;
use tessera_governance::{DeadlineScheduler, ProposalState, VotingEngine};
use tessera_rpc::RpcServer;
use tessera_storage::{JsonFileStore, KeyValueStore, MemoryStore};
use tessera_types::SystemClock;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Node state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Initializing
    Initializing,
    /// Running normally
    Running,
    /// Shutting down
    ShuttingDown,
    /// Stopped
    Stopped,
}

impl NodeState {
    /// Check if node is active.
    pub fn is_active(&self) -> bool {
        matches!(self, NodeState::Running)
    }
}

/// The Tessera governance node.
pub struct TesseraNode {
    /// Node configuration
    pub config: NodeConfig,
    /// Current state
    pub node_state: Arc<RwLock<NodeState>>,
    /// Voting engine shared by RPC and scheduler
    pub engine: Arc<VotingEngine>,
    /// Prometheus collector
    pub metrics: Arc<Metrics>,
    /// RPC server
    rpc_server: Option<RpcServer>,
    /// Background tasks (scheduler, metrics endpoint)
    tasks: Vec<JoinHandle<()>>,
    /// Stops background tasks
    stop: watch::Sender<bool>,
    /// Shutdown signal
    shutdown: mpsc::Receiver<()>,
}

impl TesseraNode {
    /// Create a new node, loading governance state from the configured store.
    pub async fn new(config: NodeConfig) -> anyhow::Result<(Self, mpsc::Sender<()>)> {
        info!("Initializing Tessera node: {}", config.name);

        let store = open_store(&config)?;
        let metrics = Metrics::new()?;
        let engine = VotingEngine::open(config.governance.clone(), Arc::new(SystemClock), store)?
            .with_observer(metrics.clone());
        metrics
            .active_proposals
            .set(engine.list_proposals(Some(ProposalState::Active)).len() as f64);

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (stop, _) = watch::channel(false);

        let node = Self {
            config,
            node_state: Arc::new(RwLock::new(NodeState::Initializing)),
            engine: Arc::new(engine),
            metrics,
            rpc_server: None,
            tasks: Vec::new(),
            stop,
            shutdown: shutdown_rx,
        };

        Ok((node, shutdown_tx))
    }

    /// Start the RPC server, the deadline scheduler and, if enabled, the
    /// metrics endpoint.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        info!("Starting Tessera node");

        let rpc_server = RpcServer::start(&self.config.rpc, self.engine.clone()).await?;
        self.rpc_server = Some(rpc_server);

        let scheduler =
            DeadlineScheduler::new(self.engine.clone(), self.config.governance.scheduler.clone());
        self.tasks.push(tokio::spawn(scheduler.run(self.stop.subscribe())));

        if self.config.metrics.enabled {
            self.start_metrics();
        }

        *self.node_state.write().await = NodeState::Running;
        info!("Tessera node started successfully");
        Ok(())
    }

    fn start_metrics(&mut self) {
        let server = MetricsServer::new(self.config.metrics.addr, self.metrics.clone());
        let mut stop = self.stop.subscribe();
        self.tasks.push(tokio::spawn(async move {
            let signal = async move {
                let _ = stop.wait_for(|stopped| *stopped).await;
            };
            if let Err(e) = server.start(signal).await {
                warn!("Metrics server error: {}", e);
            }
        }));
    }

    /// Address the RPC server is bound to, once started.
    pub fn rpc_addr(&self) -> Option<std::net::SocketAddr> {
        self.rpc_server.as_ref().map(|s| s.local_addr())
    }

    /// Block until a shutdown signal or Ctrl+C, then shut down.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!("Node is running. Press Ctrl+C to shutdown.");

        tokio::select! {
            _ = self.shutdown.recv() => {
                info!("Shutdown signal received");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received");
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Graceful shutdown.
    pub async fn shutdown(&mut self) {
        info!("Shutting down Tessera node...");
        *self.node_state.write().await = NodeState::ShuttingDown;

        if let Some(rpc) = self.rpc_server.take() {
            info!("Stopping RPC server...");
            rpc.stop().await;
        }

        // Receivers may already be gone
        let _ = self.stop.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Background task failed: {}", e);
            }
        }

        *self.node_state.write().await = NodeState::Stopped;
        info!("Tessera node stopped");
    }

    /// Get node state.
    pub async fn state(&self) -> NodeState {
        *self.node_state.read().await
    }

    /// Check if node is healthy.
    pub async fn is_healthy(&self) -> bool {
        self.state().await.is_active()
    }
}

/// Open the configured governance store.
pub fn open_store(config: &NodeConfig) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; governance state is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Json => {
            let path = config.store_path();
            info!("Opening governance store at {:?}", path);
            Ok(Arc::new(JsonFileStore::open(&path)?))
        }
    }
}
