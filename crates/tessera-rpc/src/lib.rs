//! Tessera RPC - JSON-RPC binding of the governance engine.
//!
//! Exposes the `gov_*` command and query methods over HTTP and WebSocket
//! using jsonrpsee. Engine errors map to stable JSON-RPC error codes.

pub mod api;
pub mod error;
pub mod server;

pub use api::{GovernanceApiServer, GovernanceRpc};
pub use error::{error_codes, RpcError, RpcResult};
pub use server::{RpcServer, RpcServerConfig};
