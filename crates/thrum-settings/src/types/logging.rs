use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing-subscriber` env-filter directive, e.g. `"info,thrum=debug"`.
    pub filter: String,
    /// Emit newline-delimited JSON instead of pretty human-readable lines.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info,thrum=debug".to_string(),
            json: false,
        }
    }
}
