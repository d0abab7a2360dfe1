//! Message posting, editing, soft-deletion, and read tracking.

use rusqlite::Connection;
use serde_json::Value;

use thrum_core::ids::{AgentId, MessageId, SessionId, ThreadId};
use thrum_events::log::event::{BaseEvent, MessageRef, Scope};
use thrum_events::log::ids;
use thrum_events::sqlite::repositories::{MessageReadRepo, MessageRepo, ThreadRepo};
use thrum_events::sqlite::row_types::MessageRow;
use thrum_events::{EventLog, ThrumEvent, projector};

use crate::errors::{MessagingError, Result};

/// A message body to post: a format tag (e.g. `"text"`, `"markdown"`), the
/// content itself, and optional structured data alongside it.
pub struct MessageBody {
    pub format: String,
    pub content: String,
    pub structured: Option<Value>,
}

pub struct CreateMessageParams {
    pub message_id: MessageId,
    pub thread_id: Option<ThreadId>,
    pub session_id: SessionId,
    pub author: AgentId,
    pub authored_by: Option<AgentId>,
    pub body: MessageBody,
    pub disclosed: bool,
    pub scopes: Vec<Scope>,
    pub mentions: Vec<String>,
    pub reply_to: Option<MessageId>,
}

pub struct MessageService;

impl MessageService {
    /// Post a new message.
    ///
    /// A message must name at least one recipient: a scope (including
    /// `"all"`) or a mention. A message nobody can ever see is almost
    /// certainly a caller bug, not a valid empty broadcast.
    pub fn create(conn: &Connection, log: &EventLog, params: CreateMessageParams) -> Result<MessageRow> {
        if params.scopes.is_empty() && params.mentions.is_empty() {
            return Err(MessagingError::EmptyAudience);
        }
        if let Some(thread_id) = &params.thread_id {
            if !ThreadRepo::exists(conn, thread_id.as_str())? {
                return Err(MessagingError::UnknownThread(thread_id.to_string()));
            }
        }

        let mut refs: Vec<MessageRef> = params.mentions.iter().map(MessageRef::mention).collect();
        if let Some(reply_to) = &params.reply_to {
            refs.push(MessageRef::reply_to(reply_to.to_string()));
        }

        let event = ThrumEvent::MessageCreate {
            base: BaseEvent::new(ids::generate()),
            message_id: params.message_id.clone(),
            thread_id: params.thread_id,
            session_id: params.session_id,
            author: params.author,
            authored_by: params.authored_by,
            body_format: params.body.format,
            body_content: params.body.content,
            body_structured: params.body.structured,
            disclosed: params.disclosed,
            scopes: params.scopes,
            refs,
        };
        log.append(&event)?;
        projector::apply_event(conn, &event)?;
        MessageRepo::get_by_id(conn, params.message_id.as_str())?
            .ok_or_else(|| MessagingError::UnknownMessage(params.message_id.to_string()))
    }

    /// Edit a message's body. Only the authoring agent may edit it.
    pub fn edit(
        conn: &Connection,
        log: &EventLog,
        message_id: &MessageId,
        session_id: &SessionId,
        editor: &AgentId,
        new_body: String,
    ) -> Result<MessageRow> {
        let current = MessageRepo::get_by_id(conn, message_id.as_str())?
            .ok_or_else(|| MessagingError::UnknownMessage(message_id.to_string()))?;
        if current.author != editor.as_str() {
            return Err(MessagingError::NotMessageAuthor(message_id.to_string()));
        }

        let event = ThrumEvent::MessageEdit {
            base: BaseEvent::new(ids::generate()),
            message_id: message_id.clone(),
            session_id: session_id.clone(),
            editor: editor.clone(),
            new_body,
        };
        log.append(&event)?;
        projector::apply_event(conn, &event)?;
        MessageRepo::get_by_id(conn, message_id.as_str())?
            .ok_or_else(|| MessagingError::UnknownMessage(message_id.to_string()))
    }

    pub fn delete(conn: &Connection, log: &EventLog, message_id: &MessageId, deleted_by: &AgentId) -> Result<()> {
        if MessageRepo::get_by_id(conn, message_id.as_str())?.is_none() {
            return Err(MessagingError::UnknownMessage(message_id.to_string()));
        }

        let event = ThrumEvent::MessageDelete {
            base: BaseEvent::new(ids::generate()),
            message_id: message_id.clone(),
            deleted_by: deleted_by.clone(),
        };
        log.append(&event)?;
        projector::apply_event(conn, &event)?;
        Ok(())
    }

    /// Paginated inbox listing for an agent: every message the agent can
    /// see via an `all` scope or a direct mention, newest first. Marking a
    /// message read as a side effect of listing is best-effort — failure
    /// does not abort the listing.
    pub fn list_inbox(
        conn: &Connection,
        agent_id: &AgentId,
        session_id: &SessionId,
        unread_only: bool,
        limit: i64,
        before: Option<&str>,
        auto_mark_read: bool,
        at: &str,
    ) -> Result<Vec<MessageRow>> {
        let messages = MessageRepo::list_inbox(conn, agent_id.as_str(), unread_only, limit, before)?;
        if auto_mark_read {
            for message in &messages {
                if let Err(err) = MessageReadRepo::mark_read(conn, &message.id, agent_id.as_str(), session_id.as_str(), at) {
                    tracing::warn!(message_id = %message.id, error = %err, "failed to auto-mark message read");
                }
            }
        }
        Ok(messages)
    }

    /// Mark a message read for an agent. Read state is purely local
    /// bookkeeping — it is not event-sourced and does not sync.
    pub fn mark_read(conn: &Connection, message_id: &MessageId, agent_id: &AgentId, session_id: &SessionId, at: &str) -> Result<()> {
        if MessageRepo::get_by_id(conn, message_id.as_str())?.is_none() {
            return Err(MessagingError::UnknownMessage(message_id.to_string()));
        }
        MessageReadRepo::mark_read(conn, message_id.as_str(), agent_id.as_str(), session_id.as_str(), at)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_events::sqlite::pool::open_in_memory_pool;
    use thrum_events::sqlite::repositories::AgentRepo;

    fn agent(name: &str) -> AgentId {
        AgentId::new(name).unwrap()
    }

    fn body(content: &str) -> MessageBody {
        MessageBody { format: "text".into(), content: content.into(), structured: None }
    }

    fn setup() -> (EventLog, thrum_events::ConnectionPool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let pool = open_in_memory_pool();
        let conn = pool.get().unwrap();
        AgentRepo::upsert_registered(&conn, "claude-1", "automation", "engineer", "core", None, "2026-01-01T00:00:00Z").unwrap();
        AgentRepo::start_session(&conn, "ses_1", "claude-1", None, "2026-01-01T00:00:00Z").unwrap();
        let thread_event = ThrumEvent::ThreadCreate {
            base: BaseEvent::new(ids::generate()),
            thread_id: ThreadId::from_raw("thr_1"),
            created_by: agent("claude-1"),
            title: None,
        };
        log.append(&thread_event).unwrap();
        projector::apply_event(&conn, &thread_event).unwrap();
        (log, pool, dir)
    }

    fn base_params(message_id: &str) -> CreateMessageParams {
        CreateMessageParams {
            message_id: MessageId::from_raw(message_id),
            thread_id: Some(ThreadId::from_raw("thr_1")),
            session_id: SessionId::from_raw("ses_1"),
            author: agent("claude-1"),
            authored_by: None,
            body: body("hi"),
            disclosed: true,
            scopes: vec![Scope::new("all", "all")],
            mentions: vec![],
            reply_to: None,
        }
    }

    #[test]
    fn create_requires_thread_to_exist() {
        let (log, pool, _dir) = setup();
        let conn = pool.get().unwrap();
        let mut params = base_params("msg_1");
        params.thread_id = Some(ThreadId::from_raw("thr_missing"));
        let err = MessageService::create(&conn, &log, params).unwrap_err();
        assert!(matches!(err, MessagingError::UnknownThread(_)));
    }

    #[test]
    fn create_requires_an_audience() {
        let (log, pool, _dir) = setup();
        let conn = pool.get().unwrap();
        let mut params = base_params("msg_1");
        params.scopes = vec![];
        let err = MessageService::create(&conn, &log, params).unwrap_err();
        assert!(matches!(err, MessagingError::EmptyAudience));
    }

    #[test]
    fn create_can_stand_outside_any_thread() {
        let (log, pool, _dir) = setup();
        let conn = pool.get().unwrap();
        let mut params = base_params("msg_1");
        params.thread_id = None;
        let created = MessageService::create(&conn, &log, params).unwrap();
        assert!(created.thread_id.is_none());
    }

    #[test]
    fn create_edit_delete_round_trip() {
        let (log, pool, _dir) = setup();
        let conn = pool.get().unwrap();
        let message_id = MessageId::from_raw("msg_1");
        MessageService::create(&conn, &log, base_params("msg_1")).unwrap();

        let session_id = SessionId::from_raw("ses_1");
        let edited = MessageService::edit(&conn, &log, &message_id, &session_id, &agent("claude-1"), "v2".into()).unwrap();
        assert_eq!(edited.body_content, "v2");

        MessageService::delete(&conn, &log, &message_id, &agent("claude-1")).unwrap();
        let found = MessageRepo::get_by_id(&conn, "msg_1").unwrap().unwrap();
        assert!(found.deleted_at.is_some());
    }

    #[test]
    fn edit_unknown_message_is_an_error() {
        let (log, pool, _dir) = setup();
        let conn = pool.get().unwrap();
        let err = MessageService::edit(
            &conn,
            &log,
            &MessageId::from_raw("nonexistent"),
            &SessionId::from_raw("ses_1"),
            &agent("claude-1"),
            "x".into(),
        )
        .unwrap_err();
        assert!(matches!(err, MessagingError::UnknownMessage(_)));
    }

    #[test]
    fn edit_by_a_non_author_is_rejected() {
        let (log, pool, _dir) = setup();
        let conn = pool.get().unwrap();
        AgentRepo::upsert_registered(&conn, "claude-2", "automation", "reviewer", "core", None, "2026-01-01T00:00:00Z").unwrap();
        let message_id = MessageId::from_raw("msg_1");
        MessageService::create(&conn, &log, base_params("msg_1")).unwrap();

        let err = MessageService::edit(
            &conn,
            &log,
            &message_id,
            &SessionId::from_raw("ses_1"),
            &agent("claude-2"),
            "v2".into(),
        )
        .unwrap_err();
        assert!(matches!(err, MessagingError::NotMessageAuthor(_)));
    }

    #[test]
    fn list_inbox_can_auto_mark_read() {
        let (log, pool, _dir) = setup();
        let conn = pool.get().unwrap();
        AgentRepo::upsert_registered(&conn, "claude-2", "automation", "reviewer", "core", None, "2026-01-01T00:00:00Z").unwrap();
        AgentRepo::start_session(&conn, "ses_2", "claude-2", None, "2026-01-01T00:00:00Z").unwrap();
        MessageService::create(&conn, &log, base_params("msg_1")).unwrap();

        let inbox = MessageService::list_inbox(
            &conn,
            &agent("claude-2"),
            &SessionId::from_raw("ses_2"),
            false,
            10,
            None,
            true,
            "2026-01-01T00:05:00Z",
        )
        .unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(thrum_events::sqlite::repositories::MessageReadRepo::is_read(&conn, "msg_1", "claude-2").unwrap());
    }
}
