//! # thrum-core
//!
//! Foundation types shared by every Thrum crate: branded event/message/agent
//! identifiers, the common error kind taxonomy, process-wide constants, and
//! the `tracing` logging bootstrap.
//!
//! ## Crate position
//!
//! Foundation crate. Depended on by `thrum-settings`, `thrum-events`,
//! `thrum-sync`, `thrum-messaging`, `thrum-server`, and the `thrum-daemon`
//! binary.

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod retry;

pub use errors::{CoreError, ErrorKind, Result};
pub use ids::{AgentId, EventId, MessageId, SessionId, ThreadId};
