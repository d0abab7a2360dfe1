//! # thrum-messaging
//!
//! The domain layer above `thrum-events`: one stateless service per
//! concept (agents, threads, messages, subscriptions, groups) and a
//! connection registry that fans newly-created messages out to whichever
//! connected agents are subscribed to them.
//!
//! - [`services`] — validation and orchestration around the repositories.
//! - [`dispatch`] — live connection registry and recipient resolution.
//! - [`errors`] — the error type every service returns.

#![deny(unsafe_code)]

pub mod dispatch;
pub mod errors;
pub mod services;

pub use dispatch::{Dispatcher, Notification, Subscriber};
pub use errors::{MessagingError, Result};
pub use services::group::EVERYONE;
pub use services::{
    AgentService, ContextService, CreateMessageParams, GroupMember, GroupService, MessageBody, MessageService, SubscriptionService,
    ThreadService,
};
