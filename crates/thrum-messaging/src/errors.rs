//! Errors for the domain service layer.

use thiserror::Error;
use thrum_core::errors::{Classify, ErrorKind};
use thrum_events::EventsError;

pub type Result<T> = std::result::Result<T, MessagingError>;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("agent {0:?} is not registered")]
    UnknownAgent(String),

    #[error("session {0:?} does not exist")]
    UnknownSession(String),

    #[error("thread {0:?} does not exist")]
    UnknownThread(String),

    #[error("message {0:?} does not exist")]
    UnknownMessage(String),

    #[error("group {0:?} does not exist")]
    UnknownGroup(String),

    #[error("a group named {0:?} already exists")]
    DuplicateGroup(String),

    #[error("the {0:?} group is protected and cannot be deleted or have its membership edited")]
    ProtectedGroup(String),

    #[error("agent {agent:?} already has a subscription matching {kind}")]
    DuplicateSubscription { agent: String, kind: &'static str },

    #[error("message scopes and mentions must name at least one recipient")]
    EmptyAudience,

    #[error("subscription {0:?} does not exist or is not owned by this session")]
    NotSubscriptionOwner(String),

    #[error("message {0:?} may only be edited by the agent that authored it")]
    NotMessageAuthor(String),

    #[error("no saved context for agent {0:?}")]
    NoSavedContext(String),

    #[error("failed to access context file {path:?}: {source}")]
    ContextIo { path: String, source: std::io::Error },

    #[error(transparent)]
    Events(#[from] EventsError),
}

impl Classify for MessagingError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownAgent(_)
            | Self::UnknownSession(_)
            | Self::UnknownThread(_)
            | Self::UnknownMessage(_)
            | Self::UnknownGroup(_)
            | Self::NoSavedContext(_) => ErrorKind::Identity,
            Self::DuplicateGroup(_)
            | Self::DuplicateSubscription { .. }
            | Self::EmptyAudience
            | Self::NotSubscriptionOwner(_)
            | Self::NotMessageAuthor(_)
            | Self::ProtectedGroup(_) => ErrorKind::Conflict,
            Self::ContextIo { .. } => ErrorKind::Io,
            Self::Events(e) => e.kind(),
        }
    }
}
