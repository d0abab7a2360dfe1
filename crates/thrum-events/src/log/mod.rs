//! The append-only event log: sharded JSONL files under a worktree,
//! written with OS-level advisory locking so concurrent appenders (the
//! daemon's own RPC handlers and the sync engine's merge step) never
//! interleave partial lines.

pub mod event;
pub mod ids;
pub mod shard;

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use rustix::fs::{FlockOperation, flock};
use tracing::{debug, instrument};

use crate::errors::{EventsError, Result};
pub use event::{BaseEvent, ThrumEvent};
pub use shard::{ShardPath, shard_for};

/// A single append-only event log rooted at a worktree directory.
pub struct EventLog {
    root: PathBuf,
}

impl EventLog {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append an event to its shard.
    ///
    /// Acquires an exclusive advisory lock on the shard file for the
    /// duration of the write so two processes (or two threads) appending to
    /// the same agent's message shard never produce an interleaved line.
    /// The event id is validated before anything touches disk: a malformed
    /// id would silently break the `(timestamp, event_id)` sort the merge
    /// engine and the projector both rely on.
    #[instrument(skip(self, event), fields(event_type = event.event_type()))]
    pub fn append(&self, event: &ThrumEvent) -> Result<()> {
        ids::validate(event.base().id.as_str())?;

        let shard = shard_for(event);
        let path = self.shard_file(&shard);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| EventsError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| EventsError::Io {
                path: path.display().to_string(),
                source,
            })?;

        flock(&file, FlockOperation::LockExclusive).map_err(|e| EventsError::Lock {
            path: path.display().to_string(),
            source: std::io::Error::from(e),
        })?;

        let line = serde_json::to_string(event)?;
        let write_result = (|| -> std::io::Result<()> {
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
            // `flush()` on an unbuffered `File` is a no-op; `sync_all` is what
            // actually forces the write to durable storage before we return.
            file.sync_all()
        })();

        let _ = flock(&file, FlockOperation::Unlock);

        write_result.map_err(|source| EventsError::Io {
            path: path.display().to_string(),
            source,
        })?;

        debug!(shard = %path.display(), "appended event");
        Ok(())
    }

    /// Read every event out of a shard, in on-disk order.
    ///
    /// Lines that fail to parse are skipped with a warning rather than
    /// aborting the read — a partially-written line from a crashed
    /// appender should not make the whole shard unreadable, and the merge
    /// engine's union-by-id semantics are already tolerant of gaps.
    pub fn read_shard(&self, shard: &ShardPath) -> Result<Vec<ThrumEvent>> {
        let path = self.shard_file(shard);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&path).map_err(|source| EventsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        flock(&file, FlockOperation::LockShared).map_err(|e| EventsError::Lock {
            path: path.display().to_string(),
            source: std::io::Error::from(e),
        })?;

        let reader = BufReader::new(&file);
        let mut events = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| EventsError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ThrumEvent>(&line) {
                Ok(event) => events.push(event),
                Err(err) => {
                    tracing::warn!(
                        shard = %path.display(),
                        line = line_no,
                        error = %err,
                        "skipping unparsable event line"
                    );
                }
            }
        }

        let _ = flock(&file, FlockOperation::Unlock);
        Ok(events)
    }

    /// Discover every message shard currently on disk, for a full rebuild
    /// or a sync cycle that needs to enumerate every agent's file.
    pub fn list_message_shards(&self) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(thrum_core::constants::MESSAGES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut shards = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|source| EventsError::Io {
            path: dir.display().to_string(),
            source,
        })? {
            let entry = entry.map_err(|source| EventsError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            if entry.path().extension().is_some_and(|ext| ext == "jsonl") {
                shards.push(entry.path());
            }
        }
        shards.sort();
        Ok(shards)
    }

    fn shard_file(&self, shard: &ShardPath) -> PathBuf {
        self.root.join(shard.relative_path())
    }
}
