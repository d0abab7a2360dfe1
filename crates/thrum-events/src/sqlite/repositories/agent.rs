//! Agent repository — CRUD for the `agents` and `sessions` tables.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::{AgentRow, SessionRow};

/// Optional `agent.list` filters. `None` in either field matches every
/// agent on that axis.
#[derive(Clone, Debug, Default)]
pub struct AgentListFilter<'a> {
    pub role: Option<&'a str>,
    pub module: Option<&'a str>,
}

pub struct AgentRepo;

impl AgentRepo {
    pub fn upsert_registered(
        conn: &Connection,
        agent_id: &str,
        kind: &str,
        role: &str,
        module: &str,
        display_name: Option<&str>,
        at: &str,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO agents (id, kind, role, module, display_name, status, registered_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?6)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                role = excluded.role,
                module = excluded.module,
                display_name = excluded.display_name,
                last_seen_at = excluded.last_seen_at",
            params![agent_id, kind, role, module, display_name, at],
        )?;
        Ok(())
    }

    pub fn update_status(conn: &Connection, agent_id: &str, status: &str, at: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE agents SET status = ?1, last_seen_at = ?2 WHERE id = ?3",
            params![status, at, agent_id],
        )?;
        Ok(changed > 0)
    }

    /// Remove an agent's identity and its sessions. Messages it authored
    /// and groups it belongs to are left alone — they reference the agent
    /// id by value, not by foreign key enforcement, so history survives.
    pub fn delete(conn: &Connection, agent_id: &str) -> Result<bool> {
        conn.execute("DELETE FROM sessions WHERE agent_id = ?1", params![agent_id])?;
        let changed = conn.execute("DELETE FROM agents WHERE id = ?1", params![agent_id])?;
        Ok(changed > 0)
    }

    pub fn get_by_id(conn: &Connection, agent_id: &str) -> Result<Option<AgentRow>> {
        conn.query_row(
            "SELECT id, kind, role, module, display_name, status, registered_at, last_seen_at
             FROM agents WHERE id = ?1",
            params![agent_id],
            Self::map_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn list(conn: &Connection, filter: &AgentListFilter<'_>) -> Result<Vec<AgentRow>> {
        let mut sql = "SELECT id, kind, role, module, display_name, status, registered_at, last_seen_at
             FROM agents WHERE 1=1"
            .to_string();
        if filter.role.is_some() {
            sql.push_str(" AND role = ?1");
        }
        if filter.module.is_some() {
            sql.push_str(if filter.role.is_some() { " AND module = ?2" } else { " AND module = ?1" });
        }
        sql.push_str(" ORDER BY registered_at ASC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = match (filter.role, filter.module) {
            (Some(role), Some(module)) => stmt
                .query_map(params![role, module], Self::map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (Some(role), None) => stmt
                .query_map(params![role], Self::map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (None, Some(module)) => stmt
                .query_map(params![module], Self::map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (None, None) => stmt
                .query_map([], Self::map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }

    pub fn start_session(
        conn: &Connection,
        session_id: &str,
        agent_id: &str,
        label: Option<&str>,
        at: &str,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO sessions (id, agent_id, label, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, NULL)",
            params![session_id, agent_id, label, at],
        )?;
        Ok(())
    }

    pub fn end_session(conn: &Connection, session_id: &str, at: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET ended_at = ?1 WHERE id = ?2 AND ended_at IS NULL",
            params![at, session_id],
        )?;
        Ok(changed > 0)
    }

    pub fn get_session(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
        conn.query_row(
            "SELECT id, agent_id, label, started_at, ended_at FROM sessions WHERE id = ?1",
            params![session_id],
            Self::map_session_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List sessions, oldest first, optionally narrowed to one agent.
    pub fn list_sessions(conn: &Connection, agent_id: Option<&str>) -> Result<Vec<SessionRow>> {
        let mut stmt = if agent_id.is_some() {
            conn.prepare(
                "SELECT id, agent_id, label, started_at, ended_at FROM sessions
                 WHERE agent_id = ?1 ORDER BY started_at ASC",
            )?
        } else {
            conn.prepare("SELECT id, agent_id, label, started_at, ended_at FROM sessions ORDER BY started_at ASC")?
        };
        let rows = if let Some(agent_id) = agent_id {
            stmt.query_map(params![agent_id], Self::map_session_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map([], Self::map_session_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRow> {
        Ok(AgentRow {
            id: row.get(0)?,
            kind: row.get(1)?,
            role: row.get(2)?,
            module: row.get(3)?,
            display_name: row.get(4)?,
            status: row.get(5)?,
            registered_at: row.get(6)?,
            last_seen_at: row.get(7)?,
        })
    }

    fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get(0)?,
            agent_id: row.get(1)?,
            label: row.get(2)?,
            started_at: row.get(3)?,
            ended_at: row.get(4)?,
        })
    }
}
