//! Liveness probes.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodHandler;

pub struct HealthHandler;

#[async_trait]
impl MethodHandler for HealthHandler {
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        Ok(json!({
            "status": "ok",
            "startedAt": ctx.started_at,
            "activeConnections": ctx.dispatcher.active_connections(),
        }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

pub struct PingHandler;

#[async_trait]
impl MethodHandler for PingHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
        Ok(json!({ "pong": true }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}
