//! Message repository — CRUD for `messages`, `message_scopes`,
//! `message_refs`, `message_edits`, and `message_reads`.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::{MessageEditRow, MessageRow, RefRow, ScopeRow};

pub struct MessageBody<'a> {
    pub format: &'a str,
    pub content: &'a str,
    pub structured: Option<&'a str>,
}

pub struct CreateMessageOptions<'a> {
    pub id: &'a str,
    pub thread_id: Option<&'a str>,
    pub session_id: &'a str,
    pub author: &'a str,
    pub authored_by: Option<&'a str>,
    pub body: MessageBody<'a>,
    pub disclosed: bool,
    pub reply_to: Option<&'a str>,
    pub scopes: &'a [(String, String)],
    pub refs: &'a [(String, String)],
    pub at: &'a str,
}

pub struct MessageRepo;

impl MessageRepo {
    pub fn create(conn: &Connection, opts: &CreateMessageOptions<'_>) -> Result<MessageRow> {
        conn.execute(
            "INSERT INTO messages (
                id, thread_id, session_id, author, authored_by,
                body_format, body_content, body_structured, disclosed,
                reply_to, created_at, deleted_at, deleted_by
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL, NULL)",
            params![
                opts.id,
                opts.thread_id,
                opts.session_id,
                opts.author,
                opts.authored_by,
                opts.body.format,
                opts.body.content,
                opts.body.structured,
                opts.disclosed,
                opts.reply_to,
                opts.at,
            ],
        )?;
        for (scope_type, scope_value) in opts.scopes {
            conn.execute(
                "INSERT OR IGNORE INTO message_scopes (message_id, scope_type, scope_value) VALUES (?1, ?2, ?3)",
                params![opts.id, scope_type, scope_value],
            )?;
        }
        for (ref_type, ref_value) in opts.refs {
            conn.execute(
                "INSERT OR IGNORE INTO message_refs (message_id, ref_type, ref_value) VALUES (?1, ?2, ?3)",
                params![opts.id, ref_type, ref_value],
            )?;
        }
        Ok(MessageRow {
            id: opts.id.to_string(),
            thread_id: opts.thread_id.map(String::from),
            session_id: opts.session_id.to_string(),
            author: opts.author.to_string(),
            authored_by: opts.authored_by.map(String::from),
            body_format: opts.body.format.to_string(),
            body_content: opts.body.content.to_string(),
            body_structured: opts.body.structured.map(String::from),
            disclosed: opts.disclosed,
            reply_to: opts.reply_to.map(String::from),
            created_at: opts.at.to_string(),
            deleted_at: None,
            deleted_by: None,
        })
    }

    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
        conn.query_row(
            "SELECT id, thread_id, session_id, author, authored_by, body_format, body_content,
                    body_structured, disclosed, reply_to, created_at, deleted_at, deleted_by
             FROM messages WHERE id = ?1",
            params![id],
            Self::map_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn get_scopes(conn: &Connection, message_id: &str) -> Result<Vec<ScopeRow>> {
        let mut stmt = conn.prepare("SELECT scope_type, scope_value FROM message_scopes WHERE message_id = ?1")?;
        let rows = stmt
            .query_map(params![message_id], |row| {
                Ok(ScopeRow { scope_type: row.get(0)?, scope_value: row.get(1)? })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_refs(conn: &Connection, message_id: &str) -> Result<Vec<RefRow>> {
        let mut stmt = conn.prepare("SELECT ref_type, ref_value FROM message_refs WHERE message_id = ?1")?;
        let rows = stmt
            .query_map(params![message_id], |row| {
                Ok(RefRow { ref_type: row.get(0)?, ref_value: row.get(1)? })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Convenience over [`Self::get_refs`] for callers that only care about
    /// `mention` refs (role names or agent ids).
    pub fn get_mentions(conn: &Connection, message_id: &str) -> Result<Vec<String>> {
        Ok(Self::get_refs(conn, message_id)?
            .into_iter()
            .filter(|r| r.ref_type == "mention")
            .map(|r| r.ref_value)
            .collect())
    }

    pub fn edit_body(conn: &Connection, id: &str, new_body: &str, _at: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE messages SET body_content = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![new_body, id],
        )?;
        Ok(changed > 0)
    }

    pub fn soft_delete(conn: &Connection, id: &str, deleted_by: &str, at: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE messages SET deleted_at = ?1, deleted_by = ?2 WHERE id = ?3 AND deleted_at IS NULL",
            params![at, deleted_by, id],
        )?;
        Ok(changed > 0)
    }

    pub fn list_by_thread(conn: &Connection, thread_id: &str) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, session_id, author, authored_by, body_format, body_content,
                    body_structured, disclosed, reply_to, created_at, deleted_at, deleted_by
             FROM messages WHERE thread_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![thread_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Messages visible to `agent_id`: every message whose scopes include
    /// `all`, whose scopes match one of `scope_filter`, or whose refs
    /// mention the agent directly — newest first, optionally restricted to
    /// unread-only and always capped at `limit`.
    pub fn list_inbox(
        conn: &Connection,
        agent_id: &str,
        unread_only: bool,
        limit: i64,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        let base = "SELECT DISTINCT m.id, m.thread_id, m.session_id, m.author, m.authored_by, m.body_format,
                    m.body_content, m.body_structured, m.disclosed, m.reply_to, m.created_at,
                    m.deleted_at, m.deleted_by
             FROM messages m
             LEFT JOIN message_refs r ON r.message_id = m.id AND r.ref_type = 'mention'
             WHERE m.deleted_at IS NULL
               AND (
                   EXISTS (SELECT 1 FROM message_scopes s WHERE s.message_id = m.id AND s.scope_type = 'all')
                   OR r.ref_value = :agent
               )";
        let unread_clause = " AND NOT EXISTS (SELECT 1 FROM message_reads mr WHERE mr.message_id = m.id AND mr.agent_id = :agent)";
        let before_clause = " AND m.created_at < :before";
        let order_limit = " ORDER BY m.created_at DESC LIMIT :limit";

        let mut sql = base.to_string();
        if unread_only {
            sql.push_str(unread_clause);
        }
        if before.is_some() {
            sql.push_str(before_clause);
        }
        sql.push_str(order_limit);

        let mut stmt = conn.prepare(&sql)?;
        let named: Vec<(&str, &dyn rusqlite::ToSql)> = if let Some(before) = before {
            vec![(":agent", &agent_id), (":before", &before), (":limit", &limit)]
        } else {
            vec![(":agent", &agent_id), (":limit", &limit)]
        };
        let rows = stmt
            .query_map(named.as_slice(), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            id: row.get(0)?,
            thread_id: row.get(1)?,
            session_id: row.get(2)?,
            author: row.get(3)?,
            authored_by: row.get(4)?,
            body_format: row.get(5)?,
            body_content: row.get(6)?,
            body_structured: row.get(7)?,
            disclosed: row.get(8)?,
            reply_to: row.get(9)?,
            created_at: row.get(10)?,
            deleted_at: row.get(11)?,
            deleted_by: row.get(12)?,
        })
    }
}

pub struct MessageEditRepo;

impl MessageEditRepo {
    pub fn record(
        conn: &Connection,
        message_id: &str,
        session_id: &str,
        editor: &str,
        previous_body: &str,
        at: &str,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO message_edits (message_id, session_id, editor, previous_body, edited_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![message_id, session_id, editor, previous_body, at],
        )?;
        Ok(())
    }

    pub fn history(conn: &Connection, message_id: &str) -> Result<Vec<MessageEditRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, message_id, session_id, editor, previous_body, edited_at
             FROM message_edits WHERE message_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![message_id], |row| {
                Ok(MessageEditRow {
                    id: row.get(0)?,
                    message_id: row.get(1)?,
                    session_id: row.get(2)?,
                    editor: row.get(3)?,
                    previous_body: row.get(4)?,
                    edited_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

pub struct MessageReadRepo;

impl MessageReadRepo {
    pub fn mark_read(conn: &Connection, message_id: &str, agent_id: &str, session_id: &str, at: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO message_reads (message_id, agent_id, session_id, read_at) VALUES (?1, ?2, ?3, ?4)",
            params![message_id, agent_id, session_id, at],
        )?;
        Ok(())
    }

    pub fn is_read(conn: &Connection, message_id: &str, agent_id: &str) -> Result<bool> {
        let read: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM message_reads WHERE message_id = ?1 AND agent_id = ?2)",
            params![message_id, agent_id],
            |row| row.get(0),
        )?;
        Ok(read)
    }

    pub fn unread_for_agent(conn: &Connection, agent_id: &str, thread_id: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT m.id FROM messages m
             WHERE m.thread_id = ?1
               AND m.deleted_at IS NULL
               AND NOT EXISTS (
                   SELECT 1 FROM message_reads r
                   WHERE r.message_id = m.id AND r.agent_id = ?2
               )
             ORDER BY m.created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![thread_id, agent_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
