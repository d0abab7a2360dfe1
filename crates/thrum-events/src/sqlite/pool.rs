//! Connection pooling and database bootstrap.

use std::path::Path;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::{EventsError, Result};
use crate::sqlite::migrations::run_migrations;

pub type ConnectionPool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Open (and create, if missing) the projection database at `path`, run
/// migrations, and return a pool.
///
/// `path` is usually outside the synced worktree: the projection is a
/// disposable local cache, rebuildable from the log, so it is never
/// committed to the `a-sync` branch.
pub fn open_pool(path: &Path) -> Result<ConnectionPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });
    let pool = r2d2::Pool::builder()
        .max_size(8)
        .build(manager)
        .map_err(EventsError::Pool)?;

    let conn = pool.get().map_err(EventsError::Pool)?;
    run_migrations(&conn)?;
    Ok(pool)
}

/// Open an in-memory pool with migrations applied, for tests.
#[must_use]
pub fn open_in_memory_pool() -> ConnectionPool {
    let manager = SqliteConnectionManager::memory().with_init(|conn: &Connection| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("in-memory pool always builds");
    let conn = pool.get().expect("in-memory pool always has a connection");
    run_migrations(&conn).expect("migrations always succeed on a fresh in-memory db");
    pool
}
