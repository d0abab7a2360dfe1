//! Work-context repository — CRUD for `agent_work_contexts`, keyed by
//! `(session_id, agent_id)`.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::WorkContextRow;

/// One incoming work-context update. Every field beyond the key is
/// optional: a caller reports only what it knows, and [`WorkContextRepo::upsert_merged`]
/// preserves whatever it doesn't.
#[derive(Clone, Debug, Default)]
pub struct WorkContextUpsert<'a> {
    pub session_id: &'a str,
    pub agent_id: &'a str,
    pub branch: Option<&'a str>,
    pub worktree_path: Option<&'a str>,
    pub unmerged_commits: Option<&'a str>,
    pub uncommitted_files: Option<&'a str>,
    pub changed_files: Option<&'a str>,
    pub git_updated_at: Option<&'a str>,
    pub current_task: Option<&'a str>,
    pub task_updated_at: Option<&'a str>,
    pub intent: Option<&'a str>,
    pub intent_updated_at: Option<&'a str>,
}

pub struct WorkContextRepo;

impl WorkContextRepo {
    /// Merge an incoming update into the stored row for `(session_id,
    /// agent_id)`. The git-facing fields (`branch`, `worktree_path`,
    /// `unmerged_commits`, `uncommitted_files`, `changed_files`) move
    /// together as a unit and are only replaced when the incoming
    /// `git_updated_at` is at least as new as the one already stored — the
    /// one place event payload timestamps, rather than event order, decide
    /// what wins. `current_task`/`intent` always apply immediately, since
    /// they carry their own `*_updated_at` and aren't part of that race.
    pub fn upsert_merged(conn: &Connection, update: &WorkContextUpsert<'_>) -> Result<()> {
        let existing = Self::get(conn, update.session_id, update.agent_id)?;

        let git_wins = match &existing {
            None => true,
            Some(row) => match (update.git_updated_at, row.git_updated_at.as_deref()) {
                (Some(incoming), Some(current)) => incoming >= current,
                (Some(_), None) => true,
                (None, _) => false,
            },
        };

        let (branch, worktree_path, unmerged_commits, uncommitted_files, changed_files, git_updated_at) = if git_wins {
            (
                update.branch.or(existing.as_ref().and_then(|r| r.branch.as_deref())),
                update.worktree_path.or(existing.as_ref().and_then(|r| r.worktree_path.as_deref())),
                update.unmerged_commits.or(existing.as_ref().and_then(|r| r.unmerged_commits.as_deref())),
                update.uncommitted_files.or(existing.as_ref().and_then(|r| r.uncommitted_files.as_deref())),
                update.changed_files.or(existing.as_ref().and_then(|r| r.changed_files.as_deref())),
                update.git_updated_at.or(existing.as_ref().and_then(|r| r.git_updated_at.as_deref())),
            )
        } else {
            let row = existing.as_ref().expect("git_wins is false only when existing is Some");
            (
                row.branch.as_deref(),
                row.worktree_path.as_deref(),
                row.unmerged_commits.as_deref(),
                row.uncommitted_files.as_deref(),
                row.changed_files.as_deref(),
                row.git_updated_at.as_deref(),
            )
        };

        let current_task = update.current_task.or(existing.as_ref().and_then(|r| r.current_task.as_deref()));
        let task_updated_at = update.task_updated_at.or(existing.as_ref().and_then(|r| r.task_updated_at.as_deref()));
        let intent = update.intent.or(existing.as_ref().and_then(|r| r.intent.as_deref()));
        let intent_updated_at = update.intent_updated_at.or(existing.as_ref().and_then(|r| r.intent_updated_at.as_deref()));

        conn.execute(
            "INSERT INTO agent_work_contexts (
                session_id, agent_id, branch, worktree_path, unmerged_commits,
                uncommitted_files, changed_files, git_updated_at,
                current_task, task_updated_at, intent, intent_updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(session_id, agent_id) DO UPDATE SET
                branch = excluded.branch,
                worktree_path = excluded.worktree_path,
                unmerged_commits = excluded.unmerged_commits,
                uncommitted_files = excluded.uncommitted_files,
                changed_files = excluded.changed_files,
                git_updated_at = excluded.git_updated_at,
                current_task = excluded.current_task,
                task_updated_at = excluded.task_updated_at,
                intent = excluded.intent,
                intent_updated_at = excluded.intent_updated_at",
            params![
                update.session_id,
                update.agent_id,
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
            ],
        )?;
        Ok(())
    }

    pub fn get(conn: &Connection, session_id: &str, agent_id: &str) -> Result<Option<WorkContextRow>> {
        conn.query_row(
            "SELECT session_id, agent_id, branch, worktree_path, unmerged_commits,
                    uncommitted_files, changed_files, git_updated_at,
                    current_task, task_updated_at, intent, intent_updated_at
             FROM agent_work_contexts WHERE session_id = ?1 AND agent_id = ?2",
            params![session_id, agent_id],
            Self::map_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Every work context for an agent across its sessions, most recently
    /// started session last.
    pub fn list_for_agent(conn: &Connection, agent_id: &str) -> Result<Vec<WorkContextRow>> {
        let mut stmt = conn.prepare(
            "SELECT wc.session_id, wc.agent_id, wc.branch, wc.worktree_path, wc.unmerged_commits,
                    wc.uncommitted_files, wc.changed_files, wc.git_updated_at,
                    wc.current_task, wc.task_updated_at, wc.intent, wc.intent_updated_at
             FROM agent_work_contexts wc
             JOIN sessions s ON s.id = wc.session_id
             WHERE wc.agent_id = ?1 ORDER BY s.started_at ASC",
        )?;
        let rows = stmt
            .query_map(params![agent_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkContextRow> {
        Ok(WorkContextRow {
            session_id: row.get(0)?,
            agent_id: row.get(1)?,
            branch: row.get(2)?,
            worktree_path: row.get(3)?,
            unmerged_commits: row.get(4)?,
            uncommitted_files: row.get(5)?,
            changed_files: row.get(6)?,
            git_updated_at: row.get(7)?,
            current_task: row.get(8)?,
            task_updated_at: row.get(9)?,
            intent: row.get(10)?,
            intent_updated_at: row.get(11)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;
    use crate::sqlite::repositories::agent::AgentRepo;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        AgentRepo::upsert_registered(&conn, "claude-1", "automation", "engineer", "core", None, "2026-01-01T00:00:00Z").unwrap();
        AgentRepo::start_session(&conn, "ses_1", "claude-1", None, "2026-01-01T00:00:00Z").unwrap();
        conn
    }

    #[test]
    fn upsert_merges_partial_updates() {
        let conn = setup();
        WorkContextRepo::upsert_merged(
            &conn,
            &WorkContextUpsert {
                session_id: "ses_1",
                agent_id: "claude-1",
                branch: Some("main"),
                current_task: Some("write tests"),
                git_updated_at: Some("2026-01-01T00:00:00Z"),
                ..Default::default()
            },
        )
        .unwrap();
        WorkContextRepo::upsert_merged(
            &conn,
            &WorkContextUpsert {
                session_id: "ses_1",
                agent_id: "claude-1",
                intent: Some("ship the fix"),
                ..Default::default()
            },
        )
        .unwrap();

        let found = WorkContextRepo::get(&conn, "ses_1", "claude-1").unwrap().unwrap();
        assert_eq!(found.branch.as_deref(), Some("main"));
        assert_eq!(found.current_task.as_deref(), Some("write tests"));
        assert_eq!(found.intent.as_deref(), Some("ship the fix"));
    }

    #[test]
    fn stale_git_updated_at_does_not_overwrite_newer_state() {
        let conn = setup();
        WorkContextRepo::upsert_merged(
            &conn,
            &WorkContextUpsert {
                session_id: "ses_1",
                agent_id: "claude-1",
                branch: Some("feature"),
                git_updated_at: Some("2026-01-01T00:05:00Z"),
                ..Default::default()
            },
        )
        .unwrap();

        WorkContextRepo::upsert_merged(
            &conn,
            &WorkContextUpsert {
                session_id: "ses_1",
                agent_id: "claude-1",
                branch: Some("stale-branch"),
                git_updated_at: Some("2026-01-01T00:00:00Z"),
                ..Default::default()
            },
        )
        .unwrap();

        let found = WorkContextRepo::get(&conn, "ses_1", "claude-1").unwrap().unwrap();
        assert_eq!(found.branch.as_deref(), Some("feature"));
    }

    #[test]
    fn distinct_sessions_for_the_same_agent_keep_separate_rows() {
        let conn = setup();
        AgentRepo::start_session(&conn, "ses_2", "claude-1", None, "2026-01-01T00:00:00Z").unwrap();
        WorkContextRepo::upsert_merged(
            &conn,
            &WorkContextUpsert { session_id: "ses_1", agent_id: "claude-1", branch: Some("a"), ..Default::default() },
        )
        .unwrap();
        WorkContextRepo::upsert_merged(
            &conn,
            &WorkContextUpsert { session_id: "ses_2", agent_id: "claude-1", branch: Some("b"), ..Default::default() },
        )
        .unwrap();

        assert_eq!(WorkContextRepo::list_for_agent(&conn, "claude-1").unwrap().len(), 2);
    }
}
