//! Operator controls over the background replication cycle.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodHandler;

pub struct StatusHandler;

#[async_trait]
impl MethodHandler for StatusHandler {
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let status = ctx.sync.status().await;
        Ok(json!({
            "running": status.running,
            "lastCycleAt": status.last_cycle_at,
            "lastResult": status.last_result,
        }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

/// Trigger a sync cycle and return immediately — the cycle itself runs
/// asynchronously on the daemon's background loop.
pub struct ForceHandler;

#[async_trait]
impl MethodHandler for ForceHandler {
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        ctx.sync.force().await;
        Ok(json!({ "triggered": true }))
    }

    // Kicks off the background replication loop rather than touching the
    // projection database directly; the loop's own cycle does its writing
    // outside the RPC lock.
    fn is_mutation(&self) -> bool {
        false
    }
}
