//! One stateless service per domain concept, each wrapping the
//! corresponding `thrum-events` repository (and, for event-sourced
//! entities, the event log) with validation.

pub mod agent;
pub mod context;
pub mod group;
pub mod message;
pub mod subscription;
pub mod thread;

pub use agent::AgentService;
pub use context::ContextService;
pub use group::{GroupMember, GroupService};
pub use message::{CreateMessageParams, MessageBody, MessageService};
pub use subscription::SubscriptionService;
pub use thread::ThreadService;
