use serde::{Deserialize, Serialize};

/// RPC server bind configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Path of the Unix domain socket the local JSON-RPC transport listens
    /// on. Defaults to `<repo>/.thrum/thrum.sock` when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,
    /// TCP port for the `axum` WebSocket upgrade route.
    pub ws_port: u16,
    /// TCP port for the Prometheus metrics/health endpoint.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            socket_path: None,
            ws_port: 7890,
            health_port: 7891,
        }
    }
}
