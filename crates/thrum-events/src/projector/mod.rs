//! Applies events to the SQLite read model, incrementally or as a full
//! rebuild.
//!
//! Projection is a pure function of the log: [`apply_event`] is the single
//! place that turns a [`ThrumEvent`] into row mutations, and both the
//! incremental path (new events appended this sync cycle) and the full
//! rebuild path (`rebuild_projection`) call through it, so they can never
//! drift apart.

use rusqlite::Connection;
use tracing::{instrument, warn};

use crate::errors::Result;
use crate::log::{EventLog, ShardPath, ThrumEvent};
use crate::sqlite::ConnectionPool;
use crate::sqlite::repositories::message::{CreateMessageOptions, MessageBody, MessageEditRepo, MessageRepo};
use crate::sqlite::repositories::work_context::WorkContextUpsert;
use crate::sqlite::repositories::{AgentRepo, ThreadRepo, WorkContextRepo};
use crate::sqlite::repositories::agent::AgentListFilter;

/// Outcome of a rebuild, for operator visibility.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub events_applied: usize,
    pub events_skipped_unknown: usize,
    pub shards_read: usize,
}

/// Apply a single event to the projection.
///
/// `message.edit`/`message.delete` are no-ops (return `Ok(())` without
/// error) when the target message row doesn't exist yet — this happens
/// when a rebuild replays shards out of cross-shard order relative to the
/// edit's target, which `rebuild_projection` avoids by applying in global
/// `(timestamp, id)` order, but incremental apply from a partial merge can
/// still see it transiently.
#[instrument(skip(conn, event), fields(event_type = event.event_type()))]
pub fn apply_event(conn: &Connection, event: &ThrumEvent) -> Result<()> {
    let at = event.base().timestamp.to_rfc3339();
    match event {
        ThrumEvent::AgentRegister {
            agent_id,
            kind,
            role,
            module,
            display_name,
            ..
        } => {
            AgentRepo::upsert_registered(conn, agent_id.as_str(), kind, role, module, display_name.as_deref(), &at)?;
        }
        ThrumEvent::AgentSessionStart {
            agent_id,
            session_id,
            label,
            ..
        } => {
            if AgentRepo::get_by_id(conn, agent_id.as_str())?.is_none() {
                AgentRepo::upsert_registered(conn, agent_id.as_str(), "unknown", "unknown", "unknown", None, &at)?;
            }
            AgentRepo::start_session(conn, session_id.as_str(), agent_id.as_str(), label.as_deref(), &at)?;
        }
        ThrumEvent::AgentSessionEnd { session_id, .. } => {
            let _ = AgentRepo::end_session(conn, session_id.as_str(), &at)?;
        }
        ThrumEvent::AgentUpdate {
            agent_id,
            status,
            work_contexts,
            ..
        } => {
            if let Some(status) = status {
                let _ = AgentRepo::update_status(conn, agent_id.as_str(), status, &at)?;
            }
            for entry in work_contexts {
                let unmerged_commits = entry.unmerged_commits.as_ref().map(ToString::to_string);
                let uncommitted_files = entry.uncommitted_files.as_ref().map(ToString::to_string);
                let changed_files = entry.changed_files.as_ref().map(ToString::to_string);
                WorkContextRepo::upsert_merged(
                    conn,
                    &WorkContextUpsert {
                        session_id: entry.session_id.as_str(),
                        agent_id: agent_id.as_str(),
                        branch: entry.branch.as_deref(),
                        worktree_path: entry.worktree_path.as_deref(),
                        unmerged_commits: unmerged_commits.as_deref(),
                        uncommitted_files: uncommitted_files.as_deref(),
                        changed_files: changed_files.as_deref(),
                        git_updated_at: entry.git_updated_at.as_deref(),
                        current_task: entry.current_task.as_deref(),
                        task_updated_at: entry.task_updated_at.as_deref(),
                        intent: entry.intent.as_deref(),
                        intent_updated_at: entry.intent_updated_at.as_deref(),
                    },
                )?;
            }
        }
        ThrumEvent::ThreadCreate {
            thread_id,
            created_by,
            title,
            ..
        } => {
            if !ThreadRepo::exists(conn, thread_id.as_str())? {
                ThreadRepo::create(conn, thread_id.as_str(), created_by.as_str(), title.as_deref(), &at)?;
            }
        }
        ThrumEvent::MessageCreate {
            message_id,
            thread_id,
            session_id,
            author,
            authored_by,
            body_format,
            body_content,
            body_structured,
            disclosed,
            scopes,
            refs,
            ..
        } => {
            if MessageRepo::get_by_id(conn, message_id.as_str())?.is_none() {
                let structured_json = body_structured.as_ref().map(ToString::to_string);
                let scope_pairs: Vec<(String, String)> =
                    scopes.iter().map(|s| (s.scope_type.clone(), s.scope_value.clone())).collect();
                let ref_pairs: Vec<(String, String)> =
                    refs.iter().map(|r| (r.ref_type.clone(), r.ref_value.clone())).collect();
                let reply_to = refs
                    .iter()
                    .find(|r| r.ref_type == "reply_to")
                    .map(|r| r.ref_value.clone());
                MessageRepo::create(
                    conn,
                    &CreateMessageOptions {
                        id: message_id.as_str(),
                        thread_id: thread_id.as_ref().map(thrum_core::ids::ThreadId::as_str),
                        session_id: session_id.as_str(),
                        author: author.as_str(),
                        authored_by: authored_by.as_ref().map(thrum_core::ids::AgentId::as_str),
                        body: MessageBody {
                            format: body_format,
                            content: body_content,
                            structured: structured_json.as_deref(),
                        },
                        disclosed: *disclosed,
                        reply_to: reply_to.as_deref(),
                        scopes: &scope_pairs,
                        refs: &ref_pairs,
                        at: &at,
                    },
                )?;
            }
        }
        ThrumEvent::MessageEdit {
            message_id,
            session_id,
            editor,
            new_body,
            ..
        } => {
            if let Some(current) = MessageRepo::get_by_id(conn, message_id.as_str())? {
                MessageEditRepo::record(
                    conn,
                    message_id.as_str(),
                    session_id.as_str(),
                    editor.as_str(),
                    &current.body_content,
                    &at,
                )?;
                let _ = MessageRepo::edit_body(conn, message_id.as_str(), new_body, &at)?;
            } else {
                warn!(message_id = message_id.as_str(), "edit for unknown message, skipping");
            }
        }
        ThrumEvent::MessageDelete {
            message_id,
            deleted_by,
            ..
        } => {
            let _ = MessageRepo::soft_delete(conn, message_id.as_str(), deleted_by.as_str(), &at)?;
        }
    }
    Ok(())
}

/// Rebuild the entire projection from scratch by replaying every shard in
/// the event log.
///
/// Events from every shard are pooled and sorted by `(timestamp, id)`
/// before being applied, so the result is independent of shard read order
/// — the same invariant the sync engine's merge step relies on.
pub fn rebuild_projection(log: &EventLog, pool: &ConnectionPool) -> Result<RebuildReport> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM agent_work_contexts", [])?;
    conn.execute("DELETE FROM group_members", [])?;
    conn.execute("DELETE FROM groups", [])?;
    conn.execute("DELETE FROM subscriptions", [])?;
    conn.execute("DELETE FROM message_reads", [])?;
    conn.execute("DELETE FROM message_edits", [])?;
    conn.execute("DELETE FROM message_refs", [])?;
    conn.execute("DELETE FROM message_scopes", [])?;
    conn.execute("DELETE FROM messages", [])?;
    conn.execute("DELETE FROM threads", [])?;
    conn.execute("DELETE FROM sessions", [])?;
    conn.execute("DELETE FROM agents", [])?;
    let _ = AgentListFilter::default(); // kept importable for callers rebuilding then re-listing

    let mut shards = vec![ShardPath::Shared];
    for path in log.list_message_shards()? {
        let agent_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if let Ok(agent_id) = thrum_core::ids::AgentId::new(agent_name) {
            shards.push(ShardPath::Messages(agent_id));
        }
    }

    let mut all_events = Vec::new();
    for shard in &shards {
        all_events.extend(log.read_shard(shard)?);
    }
    all_events.sort_by(|a, b| {
        a.base()
            .timestamp
            .cmp(&b.base().timestamp)
            .then_with(|| a.base().id.as_str().cmp(b.base().id.as_str()))
    });

    let mut report = RebuildReport {
        shards_read: shards.len(),
        ..Default::default()
    };
    for event in &all_events {
        apply_event(&conn, event)?;
        report.events_applied += 1;
    }

    Ok(report)
}
