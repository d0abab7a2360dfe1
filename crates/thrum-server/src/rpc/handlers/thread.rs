//! Thread creation and discovery.

use async_trait::async_trait;
use serde_json::{Value, json};

use thrum_core::ids::{AgentId, ThreadId};
use thrum_events::sqlite::repositories::ThreadRepo;
use thrum_messaging::ThreadService;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{optional_string_param, require_string_param};
use crate::rpc::registry::MethodHandler;

fn get_conn(ctx: &RpcContext) -> Result<thrum_events::PooledConnection, RpcError> {
    ctx.pool.get().map_err(|e| RpcError::Internal { message: e.to_string() })
}

fn thread_json(row: &thrum_events::sqlite::row_types::ThreadRow) -> Value {
    json!({
        "id": row.id,
        "createdBy": row.created_by,
        "title": row.title,
        "createdAt": row.created_at,
    })
}

pub struct CreateHandler;

#[async_trait]
impl MethodHandler for CreateHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let thread_id = ThreadId::from_raw(require_string_param(params.as_ref(), "threadId")?);
        let created_by = AgentId::new(&require_string_param(params.as_ref(), "createdBy")?)
            .map_err(|e| RpcError::InvalidParams { message: e.to_string() })?;
        let title = optional_string_param(params.as_ref(), "title");

        let conn = get_conn(ctx)?;
        let row = ThreadService::create(&conn, &ctx.log, &thread_id, &created_by, title)?;
        Ok(thread_json(&row))
    }
}

pub struct ListHandler;

#[async_trait]
impl MethodHandler for ListHandler {
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let conn = get_conn(ctx)?;
        let threads = ThreadRepo::list(&conn)?;
        let out: Vec<Value> = threads.iter().map(thread_json).collect();
        Ok(json!({ "threads": out }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

pub struct GetHandler;

#[async_trait]
impl MethodHandler for GetHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let thread_id = require_string_param(params.as_ref(), "threadId")?;
        let conn = get_conn(ctx)?;
        let row = ThreadRepo::get_by_id(&conn, &thread_id)?.ok_or_else(|| RpcError::NotFound {
            code: crate::rpc::errors::NOT_FOUND,
            message: format!("thread {thread_id:?} does not exist"),
        })?;
        Ok(thread_json(&row))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::context::test_helpers::make_test_context;
    use serde_json::json;

    #[tokio::test]
    async fn create_list_get_round_trip() {
        let ctx = make_test_context();
        CreateHandler
            .handle(
                Some(json!({"threadId": "thr_1", "createdBy": "claude-1", "title": "planning"})),
                &ctx,
            )
            .await
            .unwrap();

        let listed = ListHandler.handle(None, &ctx).await.unwrap();
        assert_eq!(listed["threads"].as_array().unwrap().len(), 1);

        let fetched = GetHandler.handle(Some(json!({"threadId": "thr_1"})), &ctx).await.unwrap();
        assert_eq!(fetched["title"], "planning");
    }

    #[tokio::test]
    async fn get_missing_thread_is_not_found() {
        let ctx = make_test_context();
        let err = GetHandler.handle(Some(json!({"threadId": "ghost"})), &ctx).await.unwrap_err();
        assert_eq!(err.code(), crate::rpc::errors::NOT_FOUND);
    }
}
