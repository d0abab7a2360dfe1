//! Error types for the event log and projection.

use thiserror::Error;
use thrum_core::errors::{Classify, ErrorKind};

pub type Result<T> = std::result::Result<T, EventsError>;

#[derive(Debug, Error)]
pub enum EventsError {
    #[error("invalid event id {0:?}: must be time-prefixed and non-empty")]
    InvalidEventId(String),

    #[error("unknown event type {0:?}")]
    UnknownEventType(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to acquire lock on {path}: {source}")]
    Lock {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize/deserialize event: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("projection is missing a row the log implies should exist: {0}")]
    ProjectionInvariant(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Classify for EventsError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEventId(_) | Self::UnknownEventType(_) => ErrorKind::Input,
            Self::Io { .. } | Self::Lock { .. } => ErrorKind::Io,
            Self::Serde(_) => ErrorKind::Input,
            Self::Sqlite(e) if is_busy_or_locked(e) => ErrorKind::Transient,
            Self::Sqlite(_) | Self::Pool(_) => ErrorKind::Io,
            Self::ProjectionInvariant(_) => ErrorKind::Projection,
            Self::Internal(_) => ErrorKind::Fatal,
        }
    }
}

fn is_busy_or_locked(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    )
}
