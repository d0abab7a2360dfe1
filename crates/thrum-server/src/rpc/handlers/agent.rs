//! Agent and session lifecycle handlers.

use async_trait::async_trait;
use serde_json::{Value, json};

use thrum_core::ids::{AgentId, SessionId};
use thrum_events::log::event::WorkContextEntry;
use thrum_events::sqlite::repositories::AgentRepo;
use thrum_events::sqlite::repositories::agent::AgentListFilter;
use thrum_messaging::AgentService;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{now, optional_string_param, require_string_param};
use crate::rpc::registry::MethodHandler;

fn parse_agent_id(raw: &str) -> Result<AgentId, RpcError> {
    AgentId::new(raw).map_err(|e| RpcError::InvalidParams { message: e.to_string() })
}

fn get_conn(ctx: &RpcContext) -> Result<thrum_events::PooledConnection, RpcError> {
    ctx.pool.get().map_err(|e| RpcError::Internal { message: e.to_string() })
}

fn agent_json(row: &thrum_events::sqlite::row_types::AgentRow) -> Value {
    json!({
        "id": row.id,
        "kind": row.kind,
        "role": row.role,
        "module": row.module,
        "displayName": row.display_name,
        "status": row.status,
        "registeredAt": row.registered_at,
        "lastSeenAt": row.last_seen_at,
    })
}

/// Build a single work-context entry from the optional git/task/intent
/// fields an `agent.update` request may carry alongside its `sessionId`.
fn work_context_entry(params: Option<&Value>, session_id: &SessionId) -> Vec<WorkContextEntry> {
    let Some(params) = params else { return vec![] };
    let branch = optional_string_param(Some(params), "branch");
    let worktree_path = optional_string_param(Some(params), "worktreePath");
    let unmerged_commits = params.get("unmergedCommits").cloned();
    let uncommitted_files = params.get("uncommittedFiles").cloned();
    let changed_files = params.get("changedFiles").cloned();
    let git_updated_at = optional_string_param(Some(params), "gitUpdatedAt");
    let current_task = optional_string_param(Some(params), "currentTask");
    let task_updated_at = optional_string_param(Some(params), "taskUpdatedAt");
    let intent = optional_string_param(Some(params), "intent");
    let intent_updated_at = optional_string_param(Some(params), "intentUpdatedAt");

    if branch.is_none()
        && worktree_path.is_none()
        && unmerged_commits.is_none()
        && uncommitted_files.is_none()
        && changed_files.is_none()
        && current_task.is_none()
        && intent.is_none()
    {
        return vec![];
    }

    vec![WorkContextEntry {
        session_id: session_id.clone(),
        branch,
        worktree_path,
        unmerged_commits,
        uncommitted_files,
        changed_files,
        git_updated_at,
        current_task,
        task_updated_at,
        intent,
        intent_updated_at,
    }]
}

pub struct RegisterHandler;

#[async_trait]
impl MethodHandler for RegisterHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = parse_agent_id(&require_string_param(params.as_ref(), "agentId")?)?;
        let kind = require_string_param(params.as_ref(), "kind")?;
        let role = require_string_param(params.as_ref(), "role")?;
        let module = require_string_param(params.as_ref(), "module")?;
        let display_name = optional_string_param(params.as_ref(), "displayName");

        let conn = get_conn(ctx)?;
        let row = AgentService::register(&conn, &ctx.log, &agent_id, kind, role, module, display_name)?;
        Ok(agent_json(&row))
    }
}

pub struct DeleteHandler;

#[async_trait]
impl MethodHandler for DeleteHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = parse_agent_id(&require_string_param(params.as_ref(), "agentId")?)?;
        let conn = get_conn(ctx)?;
        AgentService::delete(&conn, &agent_id)?;
        Ok(json!({ "deleted": true }))
    }
}

pub struct ListHandler;

#[async_trait]
impl MethodHandler for ListHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let role = optional_string_param(params.as_ref(), "role");
        let module = optional_string_param(params.as_ref(), "module");
        let filter = AgentListFilter { role: role.as_deref(), module: module.as_deref() };

        let conn = get_conn(ctx)?;
        let agents = AgentRepo::list(&conn, &filter)?;
        let out: Vec<Value> = agents.iter().map(agent_json).collect();
        Ok(json!({ "agents": out }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

pub struct UpdateHandler;

#[async_trait]
impl MethodHandler for UpdateHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = parse_agent_id(&require_string_param(params.as_ref(), "agentId")?)?;
        let status = optional_string_param(params.as_ref(), "status");
        let session_id = optional_string_param(params.as_ref(), "sessionId").map(SessionId::from_raw);
        let work_contexts = match &session_id {
            Some(session_id) => work_context_entry(params.as_ref(), session_id),
            None => vec![],
        };

        let conn = get_conn(ctx)?;
        let row = AgentService::update(&conn, &ctx.log, &agent_id, status, work_contexts)?;
        Ok(agent_json(&row))
    }
}

pub struct SessionStartHandler;

#[async_trait]
impl MethodHandler for SessionStartHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = parse_agent_id(&require_string_param(params.as_ref(), "agentId")?)?;
        let session_id = SessionId::from_raw(require_string_param(params.as_ref(), "sessionId")?);
        let label = optional_string_param(params.as_ref(), "label");

        let conn = get_conn(ctx)?;
        let row = AgentService::start_session(&conn, &ctx.log, &agent_id, &session_id, label)?;
        Ok(json!({ "id": row.id, "agentId": row.agent_id, "startedAt": row.started_at }))
    }
}

pub struct SessionEndHandler;

#[async_trait]
impl MethodHandler for SessionEndHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = parse_agent_id(&require_string_param(params.as_ref(), "agentId")?)?;
        let session_id = SessionId::from_raw(require_string_param(params.as_ref(), "sessionId")?);

        let conn = get_conn(ctx)?;
        AgentService::end_session(&conn, &ctx.log, &agent_id, &session_id)?;
        Ok(json!({ "ended": true }))
    }
}

pub struct SessionListHandler;

#[async_trait]
impl MethodHandler for SessionListHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = match optional_string_param(params.as_ref(), "agentId") {
            Some(raw) => Some(parse_agent_id(&raw)?),
            None => None,
        };
        let conn = get_conn(ctx)?;
        let sessions = AgentService::list_sessions(&conn, agent_id.as_ref())?;
        let out: Vec<Value> = sessions
            .iter()
            .map(|s| {
                json!({
                    "id": s.id,
                    "agentId": s.agent_id,
                    "label": s.label,
                    "startedAt": s.started_at,
                    "endedAt": s.ended_at,
                })
            })
            .collect();
        Ok(json!({ "sessions": out }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

/// Refresh an agent's `last_seen_at` and, if a work-context field was
/// included, its latest git/task/intent snapshot for the session.
pub struct HeartbeatHandler;

#[async_trait]
impl MethodHandler for HeartbeatHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = parse_agent_id(&require_string_param(params.as_ref(), "agentId")?)?;
        let conn = get_conn(ctx)?;
        let existing = AgentRepo::get_by_id(&conn, agent_id.as_str())?.ok_or_else(|| RpcError::NotFound {
            code: crate::rpc::errors::NOT_FOUND,
            message: format!("agent {agent_id:?} is not registered"),
        })?;
        let session_id = optional_string_param(params.as_ref(), "sessionId").map(SessionId::from_raw);
        let work_contexts = match &session_id {
            Some(session_id) => work_context_entry(params.as_ref(), session_id),
            None => vec![],
        };
        let row = AgentService::update(&conn, &ctx.log, &agent_id, existing.status, work_contexts)?;
        Ok(json!({ "id": row.id, "lastSeenAt": now() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::context::test_helpers::make_test_context;

    #[tokio::test]
    async fn register_then_list() {
        let ctx = make_test_context();
        RegisterHandler
            .handle(
                Some(json!({"agentId": "claude-1", "kind": "automation", "role": "engineer", "module": "core", "displayName": "Claude"})),
                &ctx,
            )
            .await
            .unwrap();

        let listed = ListHandler.handle(None, &ctx).await.unwrap();
        assert_eq!(listed["agents"].as_array().unwrap().len(), 1);
        assert_eq!(listed["agents"][0]["role"], "engineer");
    }

    #[tokio::test]
    async fn list_filters_by_role() {
        let ctx = make_test_context();
        RegisterHandler
            .handle(Some(json!({"agentId": "claude-1", "kind": "automation", "role": "engineer", "module": "core"})), &ctx)
            .await
            .unwrap();
        RegisterHandler
            .handle(Some(json!({"agentId": "claude-2", "kind": "automation", "role": "reviewer", "module": "core"})), &ctx)
            .await
            .unwrap();

        let listed = ListHandler.handle(Some(json!({"role": "reviewer"})), &ctx).await.unwrap();
        assert_eq!(listed["agents"].as_array().unwrap().len(), 1);
        assert_eq!(listed["agents"][0]["id"], "claude-2");
    }

    #[tokio::test]
    async fn register_rejects_bad_agent_id() {
        let ctx = make_test_context();
        let err = RegisterHandler
            .handle(Some(json!({"agentId": "all", "kind": "automation", "role": "engineer", "module": "core"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::rpc::errors::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let ctx = make_test_context();
        RegisterHandler
            .handle(Some(json!({"agentId": "claude-1", "kind": "automation", "role": "engineer", "module": "core"})), &ctx)
            .await
            .unwrap();
        SessionStartHandler
            .handle(Some(json!({"agentId": "claude-1", "sessionId": "ses_1"})), &ctx)
            .await
            .unwrap();

        let listed = SessionListHandler.handle(Some(json!({"agentId": "claude-1"})), &ctx).await.unwrap();
        assert_eq!(listed["sessions"].as_array().unwrap().len(), 1);

        let resp = SessionEndHandler
            .handle(Some(json!({"agentId": "claude-1", "sessionId": "ses_1"})), &ctx)
            .await
            .unwrap();
        assert_eq!(resp["ended"], true);
    }

    #[tokio::test]
    async fn heartbeat_requires_existing_agent() {
        let ctx = make_test_context();
        let err = HeartbeatHandler.handle(Some(json!({"agentId": "ghost"})), &ctx).await.unwrap_err();
        assert_eq!(err.code(), crate::rpc::errors::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_merges_work_context_for_a_session() {
        let ctx = make_test_context();
        RegisterHandler
            .handle(Some(json!({"agentId": "claude-1", "kind": "automation", "role": "engineer", "module": "core"})), &ctx)
            .await
            .unwrap();
        SessionStartHandler
            .handle(Some(json!({"agentId": "claude-1", "sessionId": "ses_1"})), &ctx)
            .await
            .unwrap();

        UpdateHandler
            .handle(
                Some(json!({"agentId": "claude-1", "sessionId": "ses_1", "branch": "main", "gitUpdatedAt": "2026-01-01T00:00:00Z"})),
                &ctx,
            )
            .await
            .unwrap();

        let conn = ctx.pool.get().unwrap();
        let found = thrum_events::sqlite::repositories::WorkContextRepo::get(&conn, "ses_1", "claude-1").unwrap().unwrap();
        assert_eq!(found.branch.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn delete_removes_an_agent() {
        let ctx = make_test_context();
        RegisterHandler
            .handle(Some(json!({"agentId": "claude-1", "kind": "automation", "role": "engineer", "module": "core"})), &ctx)
            .await
            .unwrap();
        let deleted = DeleteHandler.handle(Some(json!({"agentId": "claude-1"})), &ctx).await.unwrap();
        assert_eq!(deleted["deleted"], true);
        assert!(DeleteHandler.handle(Some(json!({"agentId": "claude-1"})), &ctx).await.is_err());
    }
}
