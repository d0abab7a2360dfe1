//! One stateless repository per projection table. Every method takes
//! `&Connection` explicitly rather than holding one — call sites decide
//! the transaction boundary.

pub mod agent;
pub mod group;
pub mod message;
pub mod subscription;
pub mod thread;
pub mod work_context;

pub use agent::AgentRepo;
pub use group::GroupRepo;
pub use message::{MessageEditRepo, MessageReadRepo, MessageRepo};
pub use subscription::SubscriptionRepo;
pub use thread::ThreadRepo;
pub use work_context::WorkContextRepo;
