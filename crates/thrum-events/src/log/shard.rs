//! Shard routing: which JSONL file a given event belongs in.

use std::path::PathBuf;

use thrum_core::ids::AgentId;

use crate::log::event::ThrumEvent;

/// Shared lifecycle/thread shard, vs. a per-agent message shard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShardPath {
    /// `events.jsonl` — agent lifecycle and thread-creation events, shared
    /// by every agent.
    Shared,
    /// `messages/{agent}.jsonl` — one shard per message-authoring agent.
    Messages(AgentId),
}

impl ShardPath {
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        match self {
            Self::Shared => PathBuf::from(thrum_core::constants::EVENTS_SHARD),
            Self::Messages(agent) => PathBuf::from(thrum_core::constants::MESSAGES_DIR)
                .join(format!("{agent}.jsonl")),
        }
    }
}

/// Route an event to the shard it is appended to.
///
/// `message.create`/`message.edit`/`message.delete` are sharded by the
/// *authoring* agent (`MessageCreate::author`, `MessageEdit::editor`,
/// `MessageDelete::deleted_by`) so each agent's own shard is the append
/// point for every mutation it originates. Every other event type lives in
/// the shared lifecycle shard.
#[must_use]
pub fn shard_for(event: &ThrumEvent) -> ShardPath {
    match event {
        ThrumEvent::MessageCreate { author, .. } => ShardPath::Messages(author.clone()),
        ThrumEvent::MessageEdit { editor, .. } => ShardPath::Messages(editor.clone()),
        ThrumEvent::MessageDelete { deleted_by, .. } => ShardPath::Messages(deleted_by.clone()),
        ThrumEvent::AgentRegister { .. }
        | ThrumEvent::AgentSessionStart { .. }
        | ThrumEvent::AgentSessionEnd { .. }
        | ThrumEvent::AgentUpdate { .. }
        | ThrumEvent::ThreadCreate { .. } => ShardPath::Shared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::event::BaseEvent;
    use thrum_core::ids::{EventId, MessageId, ThreadId};

    fn agent(name: &str) -> AgentId {
        AgentId::new(name).unwrap()
    }

    #[test]
    fn message_events_shard_by_author() {
        let event = ThrumEvent::MessageCreate {
            base: BaseEvent::new(EventId::from_raw("x")),
            message_id: MessageId::from_raw("m1"),
            thread_id: Some(ThreadId::from_raw("t1")),
            session_id: thrum_core::ids::SessionId::from_raw("ses_1"),
            author: agent("claude-1"),
            authored_by: None,
            body_format: "text".into(),
            body_content: "hi".into(),
            body_structured: None,
            disclosed: true,
            scopes: vec![crate::log::event::Scope::new("all", "all")],
            refs: vec![],
        };
        assert_eq!(shard_for(&event), ShardPath::Messages(agent("claude-1")));
    }

    #[test]
    fn lifecycle_events_share_a_shard() {
        let event = ThrumEvent::AgentRegister {
            base: BaseEvent::new(EventId::from_raw("x")),
            agent_id: agent("claude-1"),
            kind: "automation".into(),
            role: "engineer".into(),
            module: "core".into(),
            display_name: None,
        };
        assert_eq!(shard_for(&event), ShardPath::Shared);
    }

    #[test]
    fn relative_path_layout() {
        assert_eq!(ShardPath::Shared.relative_path(), PathBuf::from("events.jsonl"));
        assert_eq!(
            ShardPath::Messages(agent("claude-1")).relative_path(),
            PathBuf::from("messages/claude-1.jsonl")
        );
    }
}
