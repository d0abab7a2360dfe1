//! # thrum-sync
//!
//! Replicates the event log between clones over a dedicated `a-sync`
//! orphan branch, using the system `git` binary as the transport.
//!
//! - [`git`] — the subprocess wrapper (`GitRunner`) and its scripted fake.
//! - [`worktree`] — idempotent bootstrap of the orphan branch and its
//!   sparse-checkout worktree.
//! - [`merge`] — union-by-event-id merge of JSONL shards across clones.
//! - [`cycle`] — the fetch → merge → project → notify → commit → push
//!   cycle a running daemon ticks on an interval.

#![deny(unsafe_code)]

pub mod cycle;
pub mod errors;
pub mod git;
pub mod merge;
pub mod worktree;

pub use cycle::{CycleReport, NoopSink, SyncCycle, SyncEventSink};
pub use errors::{Result, SyncError};
pub use git::{GitOptions, GitOutput, GitRunner};
pub use merge::{MergeEngine, MergeReport};
pub use worktree::SyncWorktree;
