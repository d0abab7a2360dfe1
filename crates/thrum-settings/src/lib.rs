//! # thrum-settings
//!
//! Layered configuration for the Thrum daemon.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`ThrumSettings::default()`]
//! 2. **Repository file** — `<repo>/.thrum/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `THRUM_*` overrides (highest priority)
//!
//! The global singleton is reloadable: an operator editing
//! `.thrum/settings.json` and calling [`reload_settings_from_path`] swaps
//! the cached value so every subsequent [`get_settings`] call sees it.
//!
//! ```no_run
//! use thrum_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("sync interval: {}s", settings.sync.interval_secs);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::path::Path;
use std::sync::{Arc, RwLock};

/// Global settings singleton.
///
/// `RwLock<Option<Arc<ThrumSettings>>>` rather than `OnceLock` so the cached
/// value can be swapped after a reload. Reads take the shared lock and clone
/// an `Arc`; writes only happen on (rare) reload.
static SETTINGS: RwLock<Option<Arc<ThrumSettings>>> = RwLock::new(None);

/// Get the global settings instance, loading it on first call.
///
/// If loading fails the compiled defaults are used and the failure is
/// logged — a daemon should never refuse to start because its settings
/// file is malformed.
pub fn get_settings() -> Arc<ThrumSettings> {
    {
        let guard = SETTINGS.read().expect("settings lock poisoned");
        if let Some(ref s) = *guard {
            return Arc::clone(s);
        }
    }

    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            ThrumSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Initialize the global settings with a specific value.
///
/// Replaces any previously cached settings. Used by the daemon at startup,
/// once the repository root is known, and by tests.
pub fn init_settings(settings: ThrumSettings) {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(Arc::new(settings));
}

/// Reload settings from a specific file path, swapping the global cache.
pub fn reload_settings_from_path(path: &Path) {
    let new = Arc::new(match load_settings_from_path(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, ?path, "failed to reload settings, falling back to defaults");
            ThrumSettings::default()
        }
    });
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(new);
    tracing::info!(?path, "settings reloaded from disk");
}

/// Reset the global settings cache (test-only).
#[cfg(test)]
pub(crate) fn reset_settings() {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    static SETTINGS_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn default_settings_are_valid() {
        let settings = ThrumSettings::default();
        assert_eq!(settings.sync.interval_secs, 60);
        assert_eq!(settings.sync.branch, "a-sync");
        assert_eq!(settings.sync.push_retries, 3);
        assert!(settings.server.socket_path.is_none());
    }

    #[test]
    fn init_settings_sets_custom_value() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        let mut custom = ThrumSettings::default();
        custom.sync.interval_secs = 5;
        init_settings(custom);
        assert_eq!(get_settings().sync.interval_secs, 5);
        reset_settings();
    }

    #[test]
    fn reload_settings_from_path_updates_cached_value() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        init_settings(ThrumSettings::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"sync": {"intervalSecs": 10}}"#).unwrap();

        reload_settings_from_path(&path);
        let updated = get_settings();
        assert_eq!(updated.sync.interval_secs, 10);
        assert_eq!(updated.sync.branch, "a-sync");
        reset_settings();
    }

    #[test]
    fn reload_from_nonexistent_path_falls_back_to_defaults() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        let mut custom = ThrumSettings::default();
        custom.sync.interval_secs = 999;
        init_settings(custom);

        reload_settings_from_path(Path::new("/nonexistent/settings.json"));
        assert_eq!(get_settings().sync.interval_secs, 60);
        reset_settings();
    }

    #[test]
    fn get_settings_returns_arc_for_snapshot_isolation() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        init_settings(ThrumSettings::default());

        let snapshot = get_settings();
        let mut new = ThrumSettings::default();
        new.sync.interval_secs = 1;
        init_settings(new);

        assert_eq!(snapshot.sync.interval_secs, 60);
        assert_eq!(get_settings().sync.interval_secs, 1);
        reset_settings();
    }
}
