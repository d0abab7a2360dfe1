//! Process-wide constants.

/// Highest event schema `version` this build understands without warning.
pub const SUPPORTED_EVENT_VERSION: u32 = 1;

/// Name of the orphan git branch the sync engine replicates the event log
/// through.
pub const SYNC_BRANCH: &str = "a-sync";

/// Default interval between automatic sync cycles.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Default push retry budget for a single sync cycle.
pub const DEFAULT_SYNC_PUSH_RETRIES: u32 = 3;

/// Default subprocess timeout for a single git invocation.
pub const DEFAULT_GIT_TIMEOUT_MS: u64 = 30_000;

/// Relative path, inside the synced worktree, of the shared lifecycle/thread
/// event shard.
pub const EVENTS_SHARD: &str = "events.jsonl";

/// Relative directory, inside the synced worktree, holding one message
/// shard per agent.
pub const MESSAGES_DIR: &str = "messages";

/// Filename of the SQLite projection database (not synced; rebuilt locally).
pub const PROJECTION_DB_FILE: &str = "projection.sqlite3";
