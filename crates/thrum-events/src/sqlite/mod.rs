//! SQLite-backed read model: connection pooling, schema migrations, and
//! one stateless repository per projection table.

pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod row_types;

pub use pool::{ConnectionPool, PooledConnection, open_pool};
