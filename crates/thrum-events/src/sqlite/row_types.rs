//! Plain row structs returned by the repository layer. These mirror the
//! projection tables exactly; domain-level shaping (joining subtasks,
//! computing derived fields) lives in `thrum-messaging`, not here.

#[derive(Clone, Debug, PartialEq)]
pub struct AgentRow {
    pub id: String,
    pub kind: String,
    pub role: String,
    pub module: String,
    pub display_name: Option<String>,
    pub status: Option<String>,
    pub registered_at: String,
    pub last_seen_at: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionRow {
    pub id: String,
    pub agent_id: String,
    pub label: Option<String>,
    pub started_at: String,
    pub ended_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThreadRow {
    pub id: String,
    pub created_by: String,
    pub title: Option<String>,
    pub created_at: String,
}

/// A message's `{type,value}` scope tuple, matched positionally against a
/// subscription's `scope_type`/`scope_value` pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeRow {
    pub scope_type: String,
    pub scope_value: String,
}

/// A message's `{type,value}` ref tuple — `mention` refs carry an agent id
/// or a role name, `reply_to` refs carry the parent message id.
#[derive(Clone, Debug, PartialEq)]
pub struct RefRow {
    pub ref_type: String,
    pub ref_value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessageRow {
    pub id: String,
    pub thread_id: Option<String>,
    pub session_id: String,
    pub author: String,
    pub authored_by: Option<String>,
    pub body_format: String,
    pub body_content: String,
    pub body_structured: Option<String>,
    pub disclosed: bool,
    pub reply_to: Option<String>,
    pub created_at: String,
    pub deleted_at: Option<String>,
    pub deleted_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessageEditRow {
    pub id: i64,
    pub message_id: String,
    pub session_id: String,
    pub editor: String,
    pub previous_body: String,
    pub edited_at: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionRow {
    pub id: String,
    pub session_id: String,
    pub agent_id: String,
    pub scope_type: Option<String>,
    pub scope_value: Option<String>,
    pub mention_role: Option<String>,
    pub match_all: bool,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkContextRow {
    pub session_id: String,
    pub agent_id: String,
    pub branch: Option<String>,
    pub worktree_path: Option<String>,
    pub unmerged_commits: Option<String>,
    pub uncommitted_files: Option<String>,
    pub changed_files: Option<String>,
    pub git_updated_at: Option<String>,
    pub current_task: Option<String>,
    pub task_updated_at: Option<String>,
    pub intent: Option<String>,
    pub intent_updated_at: Option<String>,
}
