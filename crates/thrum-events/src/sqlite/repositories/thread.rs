//! Thread repository — CRUD for the `threads` table.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::ThreadRow;

pub struct ThreadRepo;

impl ThreadRepo {
    pub fn create(
        conn: &Connection,
        id: &str,
        created_by: &str,
        title: Option<&str>,
        at: &str,
    ) -> Result<ThreadRow> {
        conn.execute(
            "INSERT INTO threads (id, created_by, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, created_by, title, at],
        )?;
        Ok(ThreadRow {
            id: id.to_string(),
            created_by: created_by.to_string(),
            title: title.map(String::from),
            created_at: at.to_string(),
        })
    }

    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<ThreadRow>> {
        conn.query_row(
            "SELECT id, created_by, title, created_at FROM threads WHERE id = ?1",
            params![id],
            Self::map_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn list(conn: &Connection) -> Result<Vec<ThreadRow>> {
        let mut stmt =
            conn.prepare("SELECT id, created_by, title, created_at FROM threads ORDER BY created_at ASC")?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM threads WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadRow> {
        Ok(ThreadRow {
            id: row.get(0)?,
            created_by: row.get(1)?,
            title: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}
