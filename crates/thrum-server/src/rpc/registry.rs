//! Method registry and async dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::warn;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::{METHOD_NOT_FOUND, RpcError};
use crate::rpc::types::{RpcErrorBody, RpcRequest, RpcResponse};

#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError>;

    /// Whether this method mutates the projection database and therefore
    /// needs the exclusive side of the projection lock. Defaults to `true`
    /// (the safe assumption); read-only handlers override it.
    fn is_mutation(&self) -> bool {
        true
    }
}

pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, method: &str, handler: impl MethodHandler + 'static) {
        let _ = self.handlers.insert(method.to_owned(), Arc::new(handler));
    }

    pub async fn dispatch(&self, request: RpcRequest, ctx: &RpcContext) -> RpcResponse {
        let method = request.method.clone();
        counter!("thrum_rpc_requests_total", "method" => method.clone()).increment(1);

        let Some(handler) = self.handlers.get(&method) else {
            counter!("thrum_rpc_errors_total", "method" => method.clone(), "error_type" => "method_not_found")
                .increment(1);
            return RpcResponse::error(
                &request.id,
                RpcErrorBody {
                    code: METHOD_NOT_FOUND.into(),
                    message: format!("method '{method}' not found"),
                    details: None,
                },
            );
        };

        let lock_guard = if handler.is_mutation() { ctx.projection_lock.write().await } else { ctx.projection_lock.read().await };
        let _lock_guard = match lock_guard {
            Ok(guard) => guard,
            Err(err) => {
                counter!("thrum_rpc_errors_total", "method" => method.clone(), "error_type" => err.code().to_owned())
                    .increment(1);
                return RpcResponse::error(&request.id, err.to_error_body());
            }
        };

        let start = Instant::now();
        let response = match handler.handle(request.params, ctx).await {
            Ok(result) => RpcResponse::success(&request.id, result),
            Err(err) => {
                counter!("thrum_rpc_errors_total", "method" => method.clone(), "error_type" => err.code().to_owned())
                    .increment(1);
                RpcResponse::error(&request.id, err.to_error_body())
            }
        };

        let duration = start.elapsed();
        histogram!("thrum_rpc_request_duration_seconds", "method" => method.clone()).record(duration.as_secs_f64());
        if duration.as_secs() >= 5 {
            warn!(method, duration_secs = duration.as_secs_f64(), "slow RPC request");
        }

        response
    }

    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::context::test_helpers::make_test_context;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl MethodHandler for EchoHandler {
        async fn handle(&self, params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
            Ok(params.unwrap_or(json!(null)))
        }
    }

    struct FailHandler;

    #[async_trait]
    impl MethodHandler for FailHandler {
        async fn handle(&self, _params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
            Err(RpcError::Internal { message: "boom".into() })
        }
    }

    fn request(id: &str, method: &str, params: Option<Value>) -> RpcRequest {
        RpcRequest {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn dispatch_success() {
        let ctx = make_test_context();
        let mut reg = MethodRegistry::new();
        reg.register("echo", EchoHandler);

        let resp = reg.dispatch(request("r1", "echo", Some(json!({"x": 1}))), &ctx).await;
        assert!(resp.success);
        assert_eq!(resp.result.unwrap()["x"], 1);
    }

    #[tokio::test]
    async fn dispatch_method_not_found() {
        let ctx = make_test_context();
        let reg = MethodRegistry::new();

        let resp = reg.dispatch(request("r2", "no.such", None), &ctx).await;
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn dispatch_handler_error() {
        let ctx = make_test_context();
        let mut reg = MethodRegistry::new();
        reg.register("fail", FailHandler);

        let resp = reg.dispatch(request("r3", "fail", None), &ctx).await;
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, "INTERNAL_ERROR");
    }

    #[test]
    fn methods_are_sorted() {
        let mut reg = MethodRegistry::new();
        reg.register("b.method", EchoHandler);
        reg.register("a.method", EchoHandler);
        assert_eq!(reg.methods(), vec!["a.method", "b.method"]);
    }

    #[test]
    fn has_method_check() {
        let mut reg = MethodRegistry::new();
        reg.register("system.ping", EchoHandler);
        assert!(reg.has_method("system.ping"));
        assert!(!reg.has_method("system.pong"));
    }
}
