//! Sync engine errors.

use thiserror::Error;
use thrum_core::errors::{Classify, ErrorKind};
use thrum_events::EventsError;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("git {command:?} exited {exit_code}: {stderr}")]
    GitFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("git {command:?} timed out after {timeout_ms}ms")]
    GitTimedOut { command: String, timeout_ms: u64 },

    #[error("git {command:?} was cancelled")]
    GitCancelled { command: String },

    #[error("failed to acquire the sync cycle lock: {0}")]
    Lock(std::io::Error),

    #[error("events error: {0}")]
    Events(#[from] EventsError),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("push rejected after {attempts} attempts (non-fast-forward)")]
    PushRejected { attempts: u32 },

    #[error("failed to serialize/deserialize event during merge: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Classify for SyncError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::GitFailed { .. } | Self::GitTimedOut { .. } | Self::GitCancelled { .. } => {
                ErrorKind::Subprocess
            }
            Self::Lock(_) | Self::Io { .. } => ErrorKind::Io,
            Self::Events(e) => e.kind(),
            Self::PushRejected { .. } => ErrorKind::Transient,
            Self::Serde(_) => ErrorKind::Input,
        }
    }
}
