//! The JSON-RPC surface: wire types, error mapping, handler registry, and
//! the handlers themselves.

pub mod context;
pub mod errors;
pub mod handlers;
pub mod lock;
pub mod registry;
pub mod types;

pub use context::{RpcContext, SyncHandle, SyncStatus};
pub use errors::RpcError;
pub use lock::{ProjectionGuard, ProjectionLock};
pub use registry::{MethodHandler, MethodRegistry};
pub use types::{RpcErrorBody, RpcNotification, RpcRequest, RpcResponse};

/// Build a [`MethodRegistry`] with every method this server exposes already
/// registered.
#[must_use]
pub fn build_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    handlers::register_all(&mut registry);
    registry
}
