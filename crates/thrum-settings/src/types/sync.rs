use serde::{Deserialize, Serialize};

/// Sync engine timing and retry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Seconds between automatic sync cycles.
    pub interval_secs: u64,
    /// Orphan branch name the event log is replicated through.
    pub branch: String,
    /// Push retries on non-fast-forward rejection before giving up for
    /// this cycle.
    pub push_retries: u32,
    /// Per-git-invocation subprocess timeout.
    pub git_timeout_ms: u64,
    /// Remote name to fetch/push against.
    pub remote: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            branch: "a-sync".to_string(),
            push_retries: 3,
            git_timeout_ms: 30_000,
            remote: "origin".to_string(),
        }
    }
}
