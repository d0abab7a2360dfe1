//! Subscription repository — CRUD for the `subscriptions` table.
//!
//! A subscription matches on exactly one of scope, mention, or "all" —
//! enforced by `thrum-messaging` via an app-level check-then-insert, since
//! a `UNIQUE` constraint can't express "exactly one of these nullable
//! columns is set" on its own. Every subscription is owned by the session
//! that created it: only that session may remove it.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::SubscriptionRow;

pub struct SubscriptionRepo;

impl SubscriptionRepo {
    pub fn create_scope(
        conn: &Connection,
        id: &str,
        session_id: &str,
        agent_id: &str,
        scope_type: &str,
        scope_value: &str,
        at: &str,
    ) -> Result<SubscriptionRow> {
        conn.execute(
            "INSERT INTO subscriptions (id, session_id, agent_id, scope_type, scope_value, mention_role, match_all, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0, ?6)",
            params![id, session_id, agent_id, scope_type, scope_value, at],
        )?;
        Ok(SubscriptionRow {
            id: id.to_string(),
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            scope_type: Some(scope_type.to_string()),
            scope_value: Some(scope_value.to_string()),
            mention_role: None,
            match_all: false,
            created_at: at.to_string(),
        })
    }

    pub fn create_mention(
        conn: &Connection,
        id: &str,
        session_id: &str,
        agent_id: &str,
        mention_role: &str,
        at: &str,
    ) -> Result<SubscriptionRow> {
        conn.execute(
            "INSERT INTO subscriptions (id, session_id, agent_id, scope_type, scope_value, mention_role, match_all, created_at)
             VALUES (?1, ?2, ?3, NULL, NULL, ?4, 0, ?5)",
            params![id, session_id, agent_id, mention_role, at],
        )?;
        Ok(SubscriptionRow {
            id: id.to_string(),
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            scope_type: None,
            scope_value: None,
            mention_role: Some(mention_role.to_string()),
            match_all: false,
            created_at: at.to_string(),
        })
    }

    pub fn create_all(conn: &Connection, id: &str, session_id: &str, agent_id: &str, at: &str) -> Result<SubscriptionRow> {
        conn.execute(
            "INSERT INTO subscriptions (id, session_id, agent_id, scope_type, scope_value, mention_role, match_all, created_at)
             VALUES (?1, ?2, ?3, NULL, NULL, NULL, 1, ?4)",
            params![id, session_id, agent_id, at],
        )?;
        Ok(SubscriptionRow {
            id: id.to_string(),
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            scope_type: None,
            scope_value: None,
            mention_role: None,
            match_all: true,
            created_at: at.to_string(),
        })
    }

    pub fn list_for_agent(conn: &Connection, agent_id: &str) -> Result<Vec<SubscriptionRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, agent_id, scope_type, scope_value, mention_role, match_all, created_at
             FROM subscriptions WHERE agent_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![agent_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every subscription in the repository, for the dispatcher's matching
    /// pass over a newly-appended message.
    pub fn list_all(conn: &Connection) -> Result<Vec<SubscriptionRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, agent_id, scope_type, scope_value, mention_role, match_all, created_at FROM subscriptions",
        )?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Remove a subscription, but only if `session_id` is the session that
    /// created it. Returns `Ok(false)` both when the row doesn't exist and
    /// when it exists but belongs to a different session — callers that
    /// need to tell those apart should `get_by_id` first.
    pub fn delete_owned_by_session(conn: &Connection, id: &str, session_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM subscriptions WHERE id = ?1 AND session_id = ?2",
            params![id, session_id],
        )?;
        Ok(changed > 0)
    }

    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<SubscriptionRow>> {
        conn.query_row(
            "SELECT id, session_id, agent_id, scope_type, scope_value, mention_role, match_all, created_at
             FROM subscriptions WHERE id = ?1",
            params![id],
            Self::map_row,
        )
        .optional()
        .map_err(Into::into)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubscriptionRow> {
        Ok(SubscriptionRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            agent_id: row.get(2)?,
            scope_type: row.get(3)?,
            scope_value: row.get(4)?,
            mention_role: row.get(5)?,
            match_all: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
