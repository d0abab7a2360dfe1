//! # thrum-events
//!
//! The append-only event log and the SQLite read-model projection built
//! from it.
//!
//! - [`log`] — sharded JSONL files, advisory-locked appends, shard routing.
//! - [`sqlite`] — connection pooling, schema, and one repository per
//!   projection table.
//! - [`projector`] — turns events into row mutations, incrementally or via
//!   a full rebuild.
//!
//! Subscriptions and groups are *not* event-sourced: the event log only
//! covers agent/thread/message lifecycle, so `SubscriptionRepo` and
//! `GroupRepo` are mutated directly by `thrum-messaging`'s services rather
//! than through [`projector::apply_event`].

#![deny(unsafe_code)]

pub mod errors;
pub mod log;
pub mod projector;
pub mod sqlite;

pub use errors::{EventsError, Result};
pub use log::{EventLog, ShardPath, ThrumEvent, shard_for};
pub use sqlite::{ConnectionPool, PooledConnection, open_pool};
