//! Group create / membership / deletion. `everyone` is bootstrapped at
//! daemon start (see `thrum-daemon`) and is protected from deletion and
//! manual membership edits — `GroupService` rejects both.

use async_trait::async_trait;
use serde_json::{Value, json};

use thrum_core::ids::AgentId;
use thrum_events::log::ids;
use thrum_messaging::{GroupMember, GroupService};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{now, optional_string_param, require_string_param};
use crate::rpc::registry::MethodHandler;

fn get_conn(ctx: &RpcContext) -> Result<thrum_events::PooledConnection, RpcError> {
    ctx.pool.get().map_err(|e| RpcError::Internal { message: e.to_string() })
}

fn parse_agent(raw: &str) -> Result<AgentId, RpcError> {
    AgentId::new(raw).map_err(|e| RpcError::InvalidParams { message: e.to_string() })
}

/// A member param may name either an `agentId` or a `role`, never both.
fn parse_member(params: Option<&Value>) -> Result<GroupMember, RpcError> {
    match (optional_string_param(params, "agentId"), optional_string_param(params, "role")) {
        (Some(agent_id), None) => Ok(GroupMember::Agent(parse_agent(&agent_id)?)),
        (None, Some(role)) => Ok(GroupMember::Role(role)),
        (Some(_), Some(_)) => Err(RpcError::InvalidParams { message: "specify either 'agentId' or 'role', not both".into() }),
        (None, None) => Err(RpcError::InvalidParams { message: "missing required parameter: 'agentId' or 'role'".into() }),
    }
}

pub struct CreateHandler;

#[async_trait]
impl MethodHandler for CreateHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let name = require_string_param(params.as_ref(), "name")?;
        let created_by = parse_agent(&require_string_param(params.as_ref(), "createdBy")?)?;
        let id = ids::generate().to_string();

        let conn = get_conn(ctx)?;
        let row = GroupService::create(&conn, &id, &name, &created_by, &now())?;
        Ok(json!({
            "id": row.id,
            "name": row.name,
            "createdBy": row.created_by,
            "createdAt": row.created_at,
        }))
    }
}

pub struct AddMemberHandler;

#[async_trait]
impl MethodHandler for AddMemberHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let name = require_string_param(params.as_ref(), "name")?;
        let member = parse_member(params.as_ref())?;

        let conn = get_conn(ctx)?;
        GroupService::add_member(&conn, &name, &member, &now())?;
        Ok(json!({ "added": true }))
    }
}

pub struct RemoveMemberHandler;

#[async_trait]
impl MethodHandler for RemoveMemberHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let name = require_string_param(params.as_ref(), "name")?;
        let member = parse_member(params.as_ref())?;

        let conn = get_conn(ctx)?;
        let removed = GroupService::remove_member(&conn, &name, &member)?;
        Ok(json!({ "removed": removed }))
    }
}

pub struct MembersHandler;

#[async_trait]
impl MethodHandler for MembersHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let name = require_string_param(params.as_ref(), "name")?;
        let conn = get_conn(ctx)?;
        let members = GroupService::members(&conn, &name)?;
        Ok(json!({ "members": members }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

pub struct DeleteHandler;

#[async_trait]
impl MethodHandler for DeleteHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let name = require_string_param(params.as_ref(), "name")?;
        let conn = get_conn(ctx)?;
        let deleted = GroupService::delete(&conn, &name)?;
        Ok(json!({ "deleted": deleted }))
    }
}

pub struct ListHandler;

#[async_trait]
impl MethodHandler for ListHandler {
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let conn = get_conn(ctx)?;
        let groups = GroupService::list(&conn)?;
        Ok(json!({
            "groups": groups.into_iter().map(|g| json!({
                "id": g.id,
                "name": g.name,
                "createdBy": g.created_by,
                "createdAt": g.created_at,
            })).collect::<Vec<_>>(),
        }))
    }

    fn is_mutation(&self) -> bool {
        false
    }
}

pub struct InfoHandler;

#[async_trait]
impl MethodHandler for InfoHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let name = require_string_param(params.as_ref(), "name")?;
        let conn = get_conn(ctx)?;
        let group = GroupService::info(&conn, &name)?;
        let members = GroupService::members(&conn, &name)?;
        Ok(json!({
            "id": group.id,
            "name": group.name,
            "createdBy": group.created_by,
            "createdAt": group.created_at,
            "members": members,
        }))
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
        AgentService::register(&conn, &ctx.log, &AgentId::new("claude-2").unwrap(), "automation".into(), "reviewer".into(), "core".into(), None)
            .unwrap();
    }

    #[tokio::test]
    async fn create_add_remove_member() {
        let ctx = make_test_context();
        seed(&ctx).await;

        CreateHandler
            .handle(Some(json!({"name": "team-a", "createdBy": "claude-1"})), &ctx)
            .await
            .unwrap();
        AddMemberHandler
            .handle(Some(json!({"name": "team-a", "agentId": "claude-2"})), &ctx)
            .await
            .unwrap();

        let members = MembersHandler.handle(Some(json!({"name": "team-a"})), &ctx).await.unwrap();
        assert_eq!(members["members"], json!(["claude-2"]));

        let removed = RemoveMemberHandler
            .handle(Some(json!({"name": "team-a", "agentId": "claude-2"})), &ctx)
            .await
            .unwrap();
        assert_eq!(removed["removed"], true);
    }

    #[tokio::test]
    async fn add_member_by_role_resolves_current_holders() {
        let ctx = make_test_context();
        seed(&ctx).await;

        CreateHandler
            .handle(Some(json!({"name": "reviewers", "createdBy": "claude-1"})), &ctx)
            .await
            .unwrap();
        AddMemberHandler
            .handle(Some(json!({"name": "reviewers", "role": "reviewer"})), &ctx)
            .await
            .unwrap();

        let members = MembersHandler.handle(Some(json!({"name": "reviewers"})), &ctx).await.unwrap();
        assert_eq!(members["members"], json!(["claude-2"]));
    }

    #[tokio::test]
    async fn duplicate_group_name_is_a_conflict() {
        let ctx = make_test_context();
        seed(&ctx).await;
        CreateHandler
            .handle(Some(json!({"name": "team-a", "createdBy": "claude-1"})), &ctx)
            .await
            .unwrap();
        let err = CreateHandler
            .handle(Some(json!({"name": "team-a", "createdBy": "claude-1"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn delete_and_list_and_info() {
        let ctx = make_test_context();
        seed(&ctx).await;

        CreateHandler
            .handle(Some(json!({"name": "team-a", "createdBy": "claude-1"})), &ctx)
            .await
            .unwrap();

        let info = InfoHandler.handle(Some(json!({"name": "team-a"})), &ctx).await.unwrap();
        assert_eq!(info["name"], "team-a");

        let listed = ListHandler.handle(None, &ctx).await.unwrap();
        assert_eq!(listed["groups"].as_array().unwrap().len(), 1);

        let deleted = DeleteHandler.handle(Some(json!({"name": "team-a"})), &ctx).await.unwrap();
        assert_eq!(deleted["deleted"], true);
        assert!(InfoHandler.handle(Some(json!({"name": "team-a"})), &ctx).await.is_err());
    }

    #[tokio::test]
    async fn everyone_group_is_protected() {
        let ctx = make_test_context();
        seed(&ctx).await;
        let conn = ctx.pool.get().unwrap();
        thrum_messaging::GroupService::ensure_everyone(&conn, &now()).unwrap();
        drop(conn);

        let err = DeleteHandler
            .handle(Some(json!({"name": thrum_messaging::EVERYONE})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let members = MembersHandler
            .handle(Some(json!({"name": thrum_messaging::EVERYONE})), &ctx)
            .await
            .unwrap();
        let mut names: Vec<String> =
            members["members"].as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["claude-1", "claude-2"]);
    }
}
