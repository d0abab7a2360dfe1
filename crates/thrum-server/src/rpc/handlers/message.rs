//! Message posting, inbox listing, and per-message operations.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use thrum_core::ids::{AgentId, MessageId, SessionId, ThreadId};
use thrum_events::log::event::Scope;
use thrum_events::sqlite::repositories::MessageRepo;
use thrum_events::sqlite::row_types::MessageRow;
use thrum_messaging::{CreateMessageParams, GroupService, MessageBody, MessageService, Notification};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{now, optional_string_array_param, optional_string_param, require_string_param};
use crate::rpc::registry::MethodHandler;

fn get_conn(ctx: &RpcContext) -> Result<thrum_events::PooledConnection, RpcError> {
    ctx.pool.get().map_err(|e| RpcError::Internal { message: e.to_string() })
}

fn parse_agent(raw: &str) -> Result<AgentId, RpcError> {
    AgentId::new(raw).map_err(|e| RpcError::InvalidParams { message: e.to_string() })
}

fn message_json(row: &MessageRow) -> Value {
    json!({
        "id": row.id,
        "threadId": row.thread_id,
        "sessionId": row.session_id,
        "author": row.author,
        "authoredBy": row.authored_by,
        "body": {
            "format": row.body_format,
            "content": row.body_content,
            "structured": row.body_structured.as_deref().and_then(|s| serde_json::from_str::<Value>(s).ok()),
        },
        "disclosed": row.disclosed,
        "replyTo": row.reply_to,
        "createdAt": row.created_at,
        "deletedAt": row.deleted_at,
        "deletedBy": row.deleted_by,
    })
}

/// Expand `@groupname` recipients into a mention per resolved member — per
/// the rule that sending to a group is equivalent to mentioning each of its
/// members individually.
fn expand_group_mentions(conn: &rusqlite::Connection, mentions: Vec<String>) -> Result<Vec<String>, RpcError> {
    let mut out = Vec::with_capacity(mentions.len());
    for mention in mentions {
        match mention.strip_prefix('@') {
            Some(group_name) => {
                let members = GroupService::members(conn, group_name)?;
                out.extend(members);
            }
            None => out.push(mention),
        }
    }
    Ok(out)
}

/// Publish a message, project it, and fan it out to live subscribers.
pub struct SendHandler;

#[async_trait]
impl MethodHandler for SendHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let message_id = MessageId::from_raw(require_string_param(params.as_ref(), "messageId")?);
        let thread_id = optional_string_param(params.as_ref(), "threadId").map(ThreadId::from_raw);
        let session_id = SessionId::from_raw(require_string_param(params.as_ref(), "sessionId")?);
        let author = parse_agent(&require_string_param(params.as_ref(), "author")?)?;
        let authored_by = match optional_string_param(params.as_ref(), "authoredBy") {
            Some(raw) => Some(parse_agent(&raw)?),
            None => None,
        };
        let body_format = optional_string_param(params.as_ref(), "bodyFormat").unwrap_or_else(|| "text".to_string());
        let body_content = require_string_param(params.as_ref(), "body")?;
        let body_structured = params.as_ref().and_then(|p| p.get("bodyStructured")).cloned();
        let disclosed = params.as_ref().and_then(|p| p.get("disclosed")).and_then(Value::as_bool).unwrap_or(true);
        let scopes: Vec<Scope> = optional_string_array_param(params.as_ref(), "scopeTypes")
            .into_iter()
            .zip(optional_string_array_param(params.as_ref(), "scopeValues"))
            .map(|(t, v)| Scope::new(t, v))
            .collect();
        let reply_to = optional_string_param(params.as_ref(), "replyTo").map(MessageId::from_raw);

        let conn = get_conn(ctx)?;
        let mentions = expand_group_mentions(&conn, optional_string_array_param(params.as_ref(), "mentions"))?;

        let row = MessageService::create(
            &conn,
            &ctx.log,
            CreateMessageParams {
                message_id: message_id.clone(),
                thread_id,
                session_id: session_id.clone(),
                author: author.clone(),
                authored_by,
                body: MessageBody { format: body_format, content: body_content, structured: body_structured },
                disclosed,
                scopes,
                mentions,
                reply_to: reply_to.clone(),
            },
        )?;

        // Replying marks the message being replied to as read for the author,
        // same as fetching it would.
        if let Some(parent_id) = reply_to {
            MessageService::mark_read(&conn, &parent_id, &author, &session_id, &now())?;
        }

        let payload: Arc<str> = serde_json::to_string(&json!({
            "method": "notification.message",
            "params": message_json(&row),
        }))
        .unwrap_or_default()
        .into();
        let notification = Notification::for_message(&conn, message_id.as_str(), payload)?;
        let delivered = ctx.dispatcher.dispatch(&conn, &notification).await?;

        let mut out = message_json(&row);
        out["deliveredTo"] = json!(delivered);
        Ok(out)
    }
}

/// Paginated inbox listing: every message visible to an agent via an `all`
/// scope or a direct mention, newest first, with an optional unread-only
/// filter. Listing without the unread filter auto-marks the returned
/// messages read.
pub struct ListHandler;

#[async_trait]
impl MethodHandler for ListHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let agent_id = parse_agent(&require_string_param(params.as_ref(), "agentId")?)?;
        let session_id = SessionId::from_raw(require_string_param(params.as_ref(), "sessionId")?);
        let unread_only = params.as_ref().and_then(|p| p.get("unreadOnly")).and_then(Value::as_bool).unwrap_or(false);
        let limit = params.as_ref().and_then(|p| p.get("limit")).and_then(Value::as_i64).unwrap_or(50);
        let before = optional_string_param(params.as_ref(), "before");

        let conn = get_conn(ctx)?;
        let rows = MessageService::list_inbox(
            &conn,
            &agent_id,
            &session_id,
            unread_only,
            limit,
            before.as_deref(),
            !unread_only,
            &now(),
        )?;
        let out: Vec<Value> = rows.iter().map(message_json).collect();
        Ok(json!({ "messages": out }))
    }
}

pub struct GetHandler;

#[async_trait]
impl MethodHandler for GetHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let message_id = require_string_param(params.as_ref(), "messageId")?;
        let conn = get_conn(ctx)?;
        let row = MessageRepo::get_by_id(&conn, &message_id)?.ok_or_else(|| RpcError::NotFound {
            code: crate::rpc::errors::NOT_FOUND,
            message: format!("message {message_id:?} does not exist"),
        })?;

        if let (Some(agent_raw), Some(session_raw)) = (
            optional_string_param(params.as_ref(), "agentId"),
            optional_string_param(params.as_ref(), "sessionId"),
        ) {
            let agent_id = parse_agent(&agent_raw)?;
            let session_id = SessionId::from_raw(session_raw);
            MessageService::mark_read(&conn, &MessageId::from_raw(message_id), &agent_id, &session_id, &now())?;
        }

        Ok(message_json(&row))
    }
}

pub struct EditHandler;

#[async_trait]
impl MethodHandler for EditHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let message_id = MessageId::from_raw(require_string_param(params.as_ref(), "messageId")?);
        let session_id = SessionId::from_raw(require_string_param(params.as_ref(), "sessionId")?);
        let editor = parse_agent(&require_string_param(params.as_ref(), "editor")?)?;
        let new_body = require_string_param(params.as_ref(), "body")?;

        let conn = get_conn(ctx)?;
        let row = MessageService::edit(&conn, &ctx.log, &message_id, &session_id, &editor, new_body)?;
        Ok(message_json(&row))
    }
}

pub struct DeleteHandler;

#[async_trait]
impl MethodHandler for DeleteHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let message_id = MessageId::from_raw(require_string_param(params.as_ref(), "messageId")?);
        let deleted_by = parse_agent(&require_string_param(params.as_ref(), "deletedBy")?)?;

        let conn = get_conn(ctx)?;
        MessageService::delete(&conn, &ctx.log, &message_id, &deleted_by)?;
        Ok(json!({ "deleted": true }))
    }
}

pub struct MarkReadHandler;

#[async_trait]
impl MethodHandler for MarkReadHandler {
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let message_id = MessageId::from_raw(require_string_param(params.as_ref(), "messageId")?);
        let agent_id = parse_agent(&require_string_param(params.as_ref(), "agentId")?)?;
        let session_id = SessionId::from_raw(require_string_param(params.as_ref(), "sessionId")?);

        let conn = get_conn(ctx)?;
        MessageService::mark_read(&conn, &message_id, &agent_id, &session_id, &now())?;
        Ok(json!({ "read": true }))
    }
}
