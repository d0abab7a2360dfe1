//! Per-agent saved context and preamble notes. Content crosses the wire
//! Base64-encoded since it may hold arbitrary structured text; the service
//! layer underneath stores and returns raw bytes.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use thrum_messaging::ContextService;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::require_string_param;
use crate::rpc::registry::MethodHandler;

fn decode_content(params: Option<&Value>) -> Result<Vec<u8>, RpcError> {
    let encoded = require_string_param(params, "content")?;
    BASE64.decode(encoded).map_err(|e| RpcError::InvalidParams { message: format!("'content' must be valid base64: {e}") })
}

pub struct SaveHandler;

#[async_trait]
impl MethodHandler for SaveHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = require_string_param(params.as_ref(), "agentId")?;
        let content = decode_content(params.as_ref())?;
        ContextService::save(&ctx.context_dir, &agent_id, &content)?;
        Ok(json!({ "saved": true }))
    }
}

pub struct ShowHandler;

#[async_trait]
impl MethodHandler for ShowHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = require_string_param(params.as_ref(), "agentId")?;
        let content = ContextService::show(&ctx.context_dir, &agent_id)?;
        Ok(json!({ "content": BASE64.encode(content) }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

pub struct ClearHandler;

#[async_trait]
impl MethodHandler for ClearHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = require_string_param(params.as_ref(), "agentId")?;
        ContextService::clear(&ctx.context_dir, &agent_id)?;
        Ok(json!({ "cleared": true }))
    }
}

pub struct PreambleSaveHandler;

#[async_trait]
impl MethodHandler for PreambleSaveHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = require_string_param(params.as_ref(), "agentId")?;
        let content = decode_content(params.as_ref())?;
        ContextService::save_preamble(&ctx.context_dir, &agent_id, &content)?;
        Ok(json!({ "saved": true }))
    }
}

pub struct PreambleShowHandler;

#[async_trait]
impl MethodHandler for PreambleShowHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = require_string_param(params.as_ref(), "agentId")?;
        let content = ContextService::show_preamble(&ctx.context_dir, &agent_id)?;
        Ok(json!({ "content": BASE64.encode(content) }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::context::test_helpers::make_test_context;

    #[tokio::test]
    async fn save_then_show_round_trips() {
        let ctx = make_test_context();
        let encoded = BASE64.encode(b"hello");
        SaveHandler.handle(Some(json!({"agentId": "claude-1", "content": encoded})), &ctx).await.unwrap();

        let shown = ShowHandler.handle(Some(json!({"agentId": "claude-1"})), &ctx).await.unwrap();
        assert_eq!(BASE64.decode(shown["content"].as_str().unwrap()).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn show_without_a_save_is_not_found() {
        let ctx = make_test_context();
        let err = ShowHandler.handle(Some(json!({"agentId": "claude-1"})), &ctx).await.unwrap_err();
        assert_eq!(err.code(), crate::rpc::errors::NOT_FOUND);
    }

    #[tokio::test]
    async fn clear_removes_saved_content() {
        let ctx = make_test_context();
        let encoded = BASE64.encode(b"hello");
        SaveHandler.handle(Some(json!({"agentId": "claude-1", "content": encoded})), &ctx).await.unwrap();
        ClearHandler.handle(Some(json!({"agentId": "claude-1"})), &ctx).await.unwrap();
        assert!(ShowHandler.handle(Some(json!({"agentId": "claude-1"})), &ctx).await.is_err());
    }

    #[tokio::test]
    async fn preamble_is_independent_of_context() {
        let ctx = make_test_context();
        SaveHandler
            .handle(Some(json!({"agentId": "claude-1", "content": BASE64.encode(b"ctx")})), &ctx)
            .await
            .unwrap();
        PreambleSaveHandler
            .handle(Some(json!({"agentId": "claude-1", "content": BASE64.encode(b"pre")})), &ctx)
            .await
            .unwrap();

        let ctx_shown = ShowHandler.handle(Some(json!({"agentId": "claude-1"})), &ctx).await.unwrap();
        let pre_shown = PreambleShowHandler.handle(Some(json!({"agentId": "claude-1"})), &ctx).await.unwrap();
        assert_eq!(BASE64.decode(ctx_shown["content"].as_str().unwrap()).unwrap(), b"ctx");
        assert_eq!(BASE64.decode(pre_shown["content"].as_str().unwrap()).unwrap(), b"pre");
    }
}
