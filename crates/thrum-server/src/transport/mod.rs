//! Local stream transport: a Unix domain socket carrying one JSON-RPC
//! object per line, for same-host clients that don't need a websocket.

pub mod unix;

pub use unix::serve_unix_socket;
