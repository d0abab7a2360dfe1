//! Shared error kind taxonomy.
//!
//! Every crate defines its own `thiserror` error enum for the errors it can
//! actually produce, but each of those enums implements [`ErrorKind`] so that
//! `thrum-server`'s RPC layer can map any error, from any crate, to the right
//! JSON-RPC error code without a central match over every concrete error
//! type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// The taxonomy every domain error in Thrum is classified into.
///
/// Mirrors the kinds spec.md enumerates: caller-supplied-data problems
/// (`Input`), identity/authorization problems (`Identity`), state conflicts
/// detected by an invariant check (`Conflict`), local storage failures
/// (`Io`), subprocess failures (`Subprocess`), read-model rebuild failures
/// (`Projection`), retryable network/lock contention (`Transient`), and
/// anything that should stop the daemon (`Fatal`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Identity,
    Conflict,
    Io,
    Subprocess,
    Projection,
    Transient,
    Fatal,
}

pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid {kind} id: {value:?}")]
    InvalidId {
        kind: &'static str,
        value: String,
    },

    #[error("agent name {name:?} is reserved")]
    ReservedAgentName { name: String },
}

impl Classify for CoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidId { .. } | Self::ReservedAgentName { .. } => ErrorKind::Input,
        }
    }
}
