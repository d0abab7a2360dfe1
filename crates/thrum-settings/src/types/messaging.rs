use serde::{Deserialize, Serialize};

/// Messaging/notifier configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagingSettings {
    /// Capacity of a subscriber's buffered notification channel before the
    /// oldest pending notification is dropped.
    pub notify_buffer_size: usize,
    /// Consecutive drops before a slow subscriber is disconnected.
    pub max_consecutive_drops: u32,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            notify_buffer_size: 64,
            max_consecutive_drops: 100,
        }
    }
}
