//! The event envelope and the concrete event variants Thrum persists.
//!
//! Every variant is generated through [`thrum_events!`], which expands a
//! declarative list of `variant { fields } => "wire.name"` entries into a
//! tagged `serde` enum plus accessor methods.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use thrum_core::ids::{AgentId, EventId, MessageId, SessionId, ThreadId};

/// Fields common to every event, flattened into the JSON object alongside
/// the variant's own fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    pub id: EventId,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    thrum_core::constants::SUPPORTED_EVENT_VERSION
}

impl BaseEvent {
    #[must_use]
    pub fn new(id: EventId) -> Self {
        Self {
            id,
            timestamp: chrono::Utc::now(),
            version: thrum_core::constants::SUPPORTED_EVENT_VERSION,
        }
    }
}

/// A message's `{type,value}` scope tuple — e.g. `{type: "module", value:
/// "auth"}` — kept as a pair rather than a flattened string so a scope
/// match can tell `{module, auth}` apart from any other type carrying the
/// same value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub scope_type: String,
    #[serde(rename = "value")]
    pub scope_value: String,
}

impl Scope {
    #[must_use]
    pub fn new(scope_type: impl Into<String>, scope_value: impl Into<String>) -> Self {
        Self {
            scope_type: scope_type.into(),
            scope_value: scope_value.into(),
        }
    }
}

/// A message's `{type,value}` ref tuple. `mention` refs carry an agent id
/// or a role name; `reply_to` refs carry the parent message id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRef {
    #[serde(rename = "type")]
    pub ref_type: String,
    #[serde(rename = "value")]
    pub ref_value: String,
}

impl MessageRef {
    #[must_use]
    pub fn mention(agent_or_role: impl Into<String>) -> Self {
        Self {
            ref_type: "mention".to_string(),
            ref_value: agent_or_role.into(),
        }
    }

    #[must_use]
    pub fn reply_to(message_id: impl Into<String>) -> Self {
        Self {
            ref_type: "reply_to".to_string(),
            ref_value: message_id.into(),
        }
    }
}

/// One agent's git/task/intent snapshot within a session, as carried by
/// `agent.update`. Merged into the projection by whichever side carries
/// the newer `git_updated_at` — the only place event payload timestamps
/// are allowed to influence projection state instead of event order.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkContextEntry {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmerged_commits: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncommitted_files: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_updated_at: Option<String>,
}

macro_rules! thrum_events {
    ($(
        $(#[doc = $doc:literal])*
        $variant:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        } => $rename:literal
    ),* $(,)?) => {
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum ThrumEvent {
            $(
                $(#[doc = $doc])*
                #[serde(rename = $rename)]
                $variant {
                    #[serde(flatten)]
                    base: BaseEvent,
                    $( $(#[$fmeta])* $field: $ty, )*
                },
            )*
        }

        impl ThrumEvent {
            #[must_use]
            pub fn base(&self) -> &BaseEvent {
                match self {
                    $(Self::$variant { base, .. } => base,)*
                }
            }

            #[must_use]
            pub fn event_type(&self) -> &'static str {
                match self {
                    $(Self::$variant { .. } => $rename,)*
                }
            }
        }

        #[cfg(test)]
        pub(crate) const VARIANT_COUNT: usize = [$($rename),*].len();
    };
}

thrum_events! {
    /// An agent registers its identity with the repository.
    AgentRegister {
        agent_id: AgentId,
        kind: String,
        role: String,
        module: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    } => "agent.register",

    /// An agent process starts a work session.
    AgentSessionStart {
        agent_id: AgentId,
        session_id: SessionId,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    } => "agent.session.start",

    /// An agent process ends a work session.
    AgentSessionEnd {
        agent_id: AgentId,
        session_id: SessionId,
    } => "agent.session.end",

    /// An agent updates its own status and/or its per-session work context.
    AgentUpdate {
        agent_id: AgentId,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        work_contexts: Vec<WorkContextEntry>,
    } => "agent.update",

    /// A new message thread is created.
    ThreadCreate {
        thread_id: ThreadId,
        created_by: AgentId,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    } => "thread.create",

    /// A message is posted. `thread_id` is optional — a message can stand
    /// alone outside any thread. Every message belongs to the session that
    /// authored it.
    MessageCreate {
        message_id: MessageId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<ThreadId>,
        session_id: SessionId,
        author: AgentId,
        /// Set when an agent posts on behalf of another identity; distinct
        /// from `author`, which is always the session's own agent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        authored_by: Option<AgentId>,
        body_format: String,
        body_content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body_structured: Option<Value>,
        #[serde(default = "default_disclosed")]
        disclosed: bool,
        /// Scopes this message is visible under. Disjoint with `refs`'
        /// mentions at the domain level, enforced by `thrum-messaging`.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        scopes: Vec<Scope>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        refs: Vec<MessageRef>,
    } => "message.create",

    /// A message's body is edited.
    MessageEdit {
        message_id: MessageId,
        session_id: SessionId,
        editor: AgentId,
        new_body: String,
    } => "message.edit",

    /// A message is soft-deleted.
    MessageDelete {
        message_id: MessageId,
        deleted_by: AgentId,
    } => "message.delete",
}

fn default_disclosed() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_count_matches_spec_event_table() {
        assert_eq!(VARIANT_COUNT, 8);
    }

    #[test]
    fn round_trips_through_json() {
        let event = ThrumEvent::MessageCreate {
            base: BaseEvent::new(EventId::from_raw("20260101T000000Z-0001")),
            message_id: MessageId::from_raw("msg_1"),
            thread_id: Some(ThreadId::from_raw("thr_1")),
            session_id: SessionId::from_raw("ses_1"),
            author: AgentId::new("claude-1").unwrap(),
            authored_by: None,
            body_format: "text".to_string(),
            body_content: "hello".to_string(),
            body_structured: None,
            disclosed: true,
            scopes: vec![Scope::new("all", "all")],
            refs: vec![],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"message.create\""));
        let back: ThrumEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn event_type_and_base_accessors() {
        let event = ThrumEvent::AgentRegister {
            base: BaseEvent::new(EventId::from_raw("20260101T000000Z-0002")),
            agent_id: AgentId::new("claude-1").unwrap(),
            kind: "automation".to_string(),
            role: "engineer".to_string(),
            module: "core".to_string(),
            display_name: None,
        };
        assert_eq!(event.event_type(), "agent.register");
        assert_eq!(event.base().id.as_str(), "20260101T000000Z-0002");
    }
}
