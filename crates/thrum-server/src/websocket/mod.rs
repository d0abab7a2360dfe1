//! WebSocket transport: upgrades an HTTP connection, binds it to a
//! [`thrum_messaging::Subscriber`], and funnels both directions — inbound
//! requests and outbound push notifications — through the same
//! [`crate::rpc::MethodRegistry`] the Unix socket transport uses.

pub mod handler;

pub use handler::{AppState, ws_handler};
