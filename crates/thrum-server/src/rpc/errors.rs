//! RPC error codes and the error type handlers return.

use thrum_core::errors::{Classify, ErrorKind};
use thrum_events::EventsError;
use thrum_messaging::MessagingError;

use crate::rpc::types::RpcErrorBody;

pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const CONFLICT: &str = "CONFLICT";
pub const TRANSIENT: &str = "TRANSIENT";

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("{message}")]
    InvalidParams { message: String },

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{message}")]
    Transient { message: String },

    #[error("{message}")]
    Internal { message: String },
}

impl RpcError {
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::NotFound { code, .. } => code,
            Self::Conflict { .. } => CONFLICT,
            Self::Transient { .. } => TRANSIENT,
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    #[must_use]
    pub fn to_error_body(&self) -> RpcErrorBody {
        RpcErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
            details: None,
        }
    }
}

/// Maps any domain error exposing [`Classify`] onto the right RPC error
/// shape, so handlers don't each hand-roll the same match.
pub fn classify_to_rpc(message: String, kind: ErrorKind) -> RpcError {
    match kind {
        ErrorKind::Input => RpcError::InvalidParams { message },
        ErrorKind::Identity => RpcError::NotFound {
            code: NOT_FOUND,
            message,
        },
        ErrorKind::Conflict => RpcError::Conflict { message },
        ErrorKind::Transient => RpcError::Transient { message },
        ErrorKind::Io | ErrorKind::Subprocess | ErrorKind::Projection | ErrorKind::Fatal => {
            RpcError::Internal { message }
        }
    }
}

impl From<MessagingError> for RpcError {
    fn from(err: MessagingError) -> Self {
        classify_to_rpc(err.to_string(), err.kind())
    }
}

impl From<EventsError> for RpcError {
    fn from(err: EventsError) -> Self {
        classify_to_rpc(err.to_string(), err.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_its_code() {
        let err = RpcError::NotFound {
            code: NOT_FOUND,
            message: "gone".into(),
        };
        assert_eq!(err.code(), NOT_FOUND);
        assert_eq!(err.to_error_body().message, "gone");
    }

    #[test]
    fn messaging_unknown_thread_becomes_not_found() {
        let err: RpcError = MessagingError::UnknownThread("thr_1".into()).into();
        assert_eq!(err.code(), NOT_FOUND);
    }

    #[test]
    fn messaging_duplicate_subscription_becomes_conflict() {
        let err: RpcError = MessagingError::DuplicateSubscription {
            agent: "claude-1".into(),
            kind: "scope",
        }
        .into();
        assert_eq!(err.code(), CONFLICT);
    }
}
