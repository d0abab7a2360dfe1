//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the on-disk JSON
//! format and implement [`Default`] with production default values. Each
//! type is also `#[serde(default)]` so a settings file can specify only the
//! fields it wants to override.

mod logging;
mod messaging;
mod server;
mod sync;

pub use logging::*;
pub use messaging::*;
pub use server::*;
pub use sync::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the Thrum daemon.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThrumSettings {
    /// Settings schema version.
    pub version: String,
    /// Sync engine timing and retry configuration.
    pub sync: SyncSettings,
    /// RPC server bind configuration.
    pub server: ServerSettings,
    /// Messaging/notifier configuration.
    pub messaging: MessagingSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for ThrumSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            sync: SyncSettings::default(),
            server: ServerSettings::default(),
            messaging: MessagingSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
