//! Group repository — CRUD for `groups` and `group_members`.
//!
//! A member row is either `{agent, <agent id>}` or `{role, <role name>}`.
//! Role members are resolved against the live `agents` table at read time,
//! so an agent that registers into a role after the group was built still
//! shows up as a member without any further action.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::GroupRow;

pub const MEMBER_TYPE_AGENT: &str = "agent";
pub const MEMBER_TYPE_ROLE: &str = "role";

pub struct GroupRepo;

impl GroupRepo {
    pub fn create(conn: &Connection, id: &str, name: &str, created_by: &str, at: &str) -> Result<GroupRow> {
        conn.execute(
            "INSERT INTO groups (id, name, created_by, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, created_by, at],
        )?;
        Ok(GroupRow {
            id: id.to_string(),
            name: name.to_string(),
            created_by: created_by.to_string(),
            created_at: at.to_string(),
        })
    }

    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<GroupRow>> {
        conn.query_row(
            "SELECT id, name, created_by, created_at FROM groups WHERE name = ?1",
            params![name],
            Self::map_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn add_member(conn: &Connection, group_id: &str, member_type: &str, member_id: &str, at: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO group_members (group_id, member_type, member_id, added_at) VALUES (?1, ?2, ?3, ?4)",
            params![group_id, member_type, member_id, at],
        )?;
        Ok(())
    }

    pub fn remove_member(conn: &Connection, group_id: &str, member_type: &str, member_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND member_type = ?2 AND member_id = ?3",
            params![group_id, member_type, member_id],
        )?;
        Ok(changed > 0)
    }

    /// Resolved member agent ids, oldest membership first: direct `agent`
    /// rows in the order they were added, then every agent currently
    /// holding a subscribed-to role, deduplicated against the direct set.
    pub fn members(conn: &Connection, group_id: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT member_type, member_id, added_at FROM group_members WHERE group_id = ?1 ORDER BY added_at ASC",
        )?;
        let member_rows = stmt
            .query_map(params![group_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for (member_type, member_id, _) in &member_rows {
            if member_type == MEMBER_TYPE_AGENT && seen.insert(member_id.clone()) {
                out.push(member_id.clone());
            }
        }
        for (member_type, role, _) in &member_rows {
            if member_type != MEMBER_TYPE_ROLE {
                continue;
            }
            let mut role_stmt = conn.prepare("SELECT id FROM agents WHERE role = ?1 ORDER BY registered_at ASC")?;
            let agents = role_stmt
                .query_map(params![role], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            for agent_id in agents {
                if seen.insert(agent_id.clone()) {
                    out.push(agent_id);
                }
            }
        }
        Ok(out)
    }

    pub fn delete(conn: &Connection, group_id: &str) -> Result<bool> {
        conn.execute("DELETE FROM group_members WHERE group_id = ?1", params![group_id])?;
        let changed = conn.execute("DELETE FROM groups WHERE id = ?1", params![group_id])?;
        Ok(changed > 0)
    }

    pub fn list(conn: &Connection) -> Result<Vec<GroupRow>> {
        let mut stmt =
            conn.prepare("SELECT id, name, created_by, created_at FROM groups ORDER BY created_at ASC")?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRow> {
        Ok(GroupRow {
            id: row.get(0)?,
            name: row.get(1)?,
            created_by: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}
