//! Subscription create/delete/list.

use async_trait::async_trait;
use serde_json::{Value, json};

use thrum_core::ids::AgentId;
use thrum_events::log::ids;
use thrum_messaging::SubscriptionService;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{now, require_param, require_string_param};
use crate::rpc::registry::MethodHandler;

fn get_conn(ctx: &RpcContext) -> Result<thrum_events::PooledConnection, RpcError> {
    ctx.pool.get().map_err(|e| RpcError::Internal { message: e.to_string() })
}

fn parse_agent(raw: &str) -> Result<AgentId, RpcError> {
    AgentId::new(raw).map_err(|e| RpcError::InvalidParams { message: e.to_string() })
}

fn subscription_json(row: &thrum_events::sqlite::row_types::SubscriptionRow) -> Value {
    json!({
        "id": row.id,
        "sessionId": row.session_id,
        "agentId": row.agent_id,
        "scopeType": row.scope_type,
        "scopeValue": row.scope_value,
        "mentionRole": row.mention_role,
        "matchAll": row.match_all,
        "createdAt": row.created_at,
    })
}

pub struct SubscribeHandler;

#[async_trait]
impl MethodHandler for SubscribeHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = parse_agent(&require_string_param(params.as_ref(), "agentId")?)?;
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let kind = require_string_param(params.as_ref(), "kind")?;
        let id = ids::generate().to_string();
        let at = now();

        let conn = get_conn(ctx)?;
        let row = match kind.as_str() {
            "scope" => {
                let scope_type = require_param(params.as_ref(), "scopeType")?
                    .as_str()
                    .ok_or_else(|| RpcError::InvalidParams { message: "'scopeType' must be a string".into() })?;
                let scope_value = require_param(params.as_ref(), "scopeValue")?
                    .as_str()
                    .ok_or_else(|| RpcError::InvalidParams { message: "'scopeValue' must be a string".into() })?;
                SubscriptionService::subscribe_scope(&conn, &id, &session_id, &agent_id, scope_type, scope_value, &at)?
            }
            "mention" => {
                let mention_role = require_param(params.as_ref(), "mentionRole")?
                    .as_str()
                    .ok_or_else(|| RpcError::InvalidParams { message: "'mentionRole' must be a string".into() })?;
                SubscriptionService::subscribe_mention(&conn, &id, &session_id, &agent_id, mention_role, &at)?
            }
            "all" => SubscriptionService::subscribe_all(&conn, &id, &session_id, &agent_id, &at)?,
            other => {
                return Err(RpcError::InvalidParams {
                    message: format!("unknown subscription kind: {other:?}"),
                });
            }
        };

        Ok(subscription_json(&row))
    }
}

pub struct UnsubscribeHandler;

#[async_trait]
impl MethodHandler for UnsubscribeHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let id = require_string_param(params.as_ref(), "id")?;
        let session_id = require_string_param(params.as_ref(), "sessionId")?;
        let conn = get_conn(ctx)?;
        SubscriptionService::unsubscribe(&conn, &id, &session_id)?;
        Ok(json!({ "removed": true }))
    }
}

pub struct ListHandler;

#[async_trait]
impl MethodHandler for ListHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = parse_agent(&require_string_param(params.as_ref(), "agentId")?)?;
        let conn = get_conn(ctx)?;
        let rows = SubscriptionService::list_for_agent(&conn, &agent_id)?;
        let out: Vec<Value> = rows.iter().map(subscription_json).collect();
        Ok(json!({ "subscriptions": out }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::context::test_helpers::make_test_context;
    use thrum_messaging::AgentService;

    async fn seed(ctx: &RpcContext) {
        let conn = ctx.pool.get().unwrap();
        AgentService::register(&conn, &ctx.log, &AgentId::new("claude-1").unwrap(), "automation".into(), "engineer".into(), "core".into(), None)
            .unwrap();
        AgentService::start_session(
            &conn,
            &ctx.log,
            &AgentId::new("claude-1").unwrap(),
            &thrum_core::ids::SessionId::from_raw("ses_1"),
            None,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn subscribe_list_unsubscribe() {
        let ctx = make_test_context();
        seed(&ctx).await;

        let created = SubscribeHandler
            .handle(
                Some(json!({"agentId": "claude-1", "sessionId": "ses_1", "kind": "scope", "scopeType": "module", "scopeValue": "team-a"})),
                &ctx,
            )
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_owned();

        let listed = ListHandler.handle(Some(json!({"agentId": "claude-1"})), &ctx).await.unwrap();
        assert_eq!(listed["subscriptions"].as_array().unwrap().len(), 1);

        let removed = UnsubscribeHandler.handle(Some(json!({"id": id, "sessionId": "ses_1"})), &ctx).await.unwrap();
        assert_eq!(removed["removed"], true);
    }

    #[tokio::test]
    async fn unsubscribe_from_a_different_session_is_rejected() {
        let ctx = make_test_context();
        seed(&ctx).await;
        AgentService::start_session(
            &ctx.pool.get().unwrap(),
            &ctx.log,
            &AgentId::new("claude-1").unwrap(),
            &thrum_core::ids::SessionId::from_raw("ses_2"),
            None,
        )
        .unwrap();

        let created = SubscribeHandler
            .handle(Some(json!({"agentId": "claude-1", "sessionId": "ses_1", "kind": "all"})), &ctx)
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_owned();

        let err = UnsubscribeHandler.handle(Some(json!({"id": id, "sessionId": "ses_2"})), &ctx).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn duplicate_scope_subscription_is_a_conflict() {
        let ctx = make_test_context();
        seed(&ctx).await;

        SubscribeHandler
            .handle(
                Some(json!({"agentId": "claude-1", "sessionId": "ses_1", "kind": "scope", "scopeType": "module", "scopeValue": "team-a"})),
                &ctx,
            )
            .await
            .unwrap();
        let err = SubscribeHandler
            .handle(
                Some(json!({"agentId": "claude-1", "sessionId": "ses_1", "kind": "scope", "scopeType": "module", "scopeValue": "team-a"})),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn unknown_kind_is_invalid() {
        let ctx = make_test_context();
        seed(&ctx).await;
        let err = SubscribeHandler
            .handle(Some(json!({"agentId": "claude-1", "sessionId": "ses_1", "kind": "bogus"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::rpc::errors::INVALID_PARAMS);
    }
}
