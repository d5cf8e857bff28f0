//! RPC server implementation.

use crate::api::{GovernanceApiServer, GovernanceRpc};
use crate::error::RpcError;
use jsonrpsee::server::{ServerBuilder, ServerHandle};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tessera_governance::VotingEngine;

/// RPC server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcServerConfig {
    /// HTTP/WebSocket listen address
    pub addr: SocketAddr,
    /// Max request body size in bytes
    pub max_body_size: u32,
    /// Max concurrent connections
    pub max_connections: u32,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8645)),
            max_body_size: 1024 * 1024, // 1 MB
            max_connections: 100,
        }
    }
}

/// Running RPC server.
pub struct RpcServer {
    local_addr: SocketAddr,
    handle: ServerHandle,
}

impl RpcServer {
    /// Bind and start serving the governance methods.
    pub async fn start(
        config: &RpcServerConfig,
        engine: Arc<VotingEngine>,
    ) -> Result<Self, RpcError> {
        let server = ServerBuilder::new()
            .max_request_body_size(config.max_body_size)
            .max_connections(config.max_connections)
            .build(config.addr)
            .await
            .map_err(|e| RpcError::InternalError(format!("Failed to build RPC server: {}", e)))?;

        let local_addr = server
            .local_addr()
            .map_err(|e| RpcError::InternalError(format!("Failed to read local address: {}", e)))?;

        let module = GovernanceRpc::new(engine).into_rpc();
        let handle = server.start(module);

        tracing::info!("RPC server started on {}", local_addr);

        Ok(Self { local_addr, handle })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for awaiting or stopping the server.
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Stop the RPC server.
    pub async fn stop(self) {
        if let Err(e) = self.handle.stop() {
            tracing::warn!("RPC server stop failed: {}", e);
        }
        self.handle.stopped().await;
        tracing::info!("RPC server stopped");
    }
}
