//! Settings file discovery, deep-merge, and environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, SettingsError};
use crate::types::ThrumSettings;

/// Default settings file path: `~/.thrum/settings.json`.
///
/// A repository-local override at `<repo>/.thrum/settings.json` takes
/// priority when the daemon is started with an explicit repo root; this
/// function only resolves the user-global fallback location.
pub fn settings_path() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").ok_or(SettingsError::NoHomeDir)?;
    Ok(PathBuf::from(home).join(".thrum").join("settings.json"))
}

/// Load settings from the default path, applying environment overrides.
///
/// If the file does not exist, compiled defaults (plus env overrides) are
/// returned rather than an error — a missing settings file is the expected
/// state for a fresh repository.
pub fn load_settings() -> Result<ThrumSettings> {
    let path = settings_path()?;
    if path.exists() {
        load_settings_from_path(&path)
    } else {
        Ok(apply_env_overrides(ThrumSettings::default()))
    }
}

/// Load settings from a specific path, deep-merging over defaults and then
/// applying environment overrides.
pub fn load_settings_from_path(path: &Path) -> Result<ThrumSettings> {
    if !path.exists() {
        return Ok(apply_env_overrides(ThrumSettings::default()));
    }

    let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let file_value: Value =
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })?;

    let defaults_value =
        serde_json::to_value(ThrumSettings::default()).expect("default settings always serialize");
    let merged_value = deep_merge(defaults_value, file_value);

    let settings: ThrumSettings =
        serde_json::from_value(merged_value).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })?;

    Ok(apply_env_overrides(settings))
}

/// Recursively merge `patch` into `base`. Objects merge key by key; any
/// other value in `patch` (including arrays) replaces the value in `base`
/// wholesale.
#[must_use]
pub fn deep_merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, patch_value),
                    None => patch_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, patch_value) => patch_value,
    }
}

fn apply_env_overrides(mut settings: ThrumSettings) -> ThrumSettings {
    if let Some(v) = env_u64("THRUM_SYNC_INTERVAL_SECS") {
        settings.sync.interval_secs = v;
    }
    if let Ok(v) = std::env::var("THRUM_SYNC_BRANCH") {
        settings.sync.branch = v;
    }
    if let Some(v) = env_u16("THRUM_WS_PORT") {
        settings.server.ws_port = v;
    }
    if let Some(v) = env_u16("THRUM_HEALTH_PORT") {
        settings.server.health_port = v;
    }
    if let Ok(v) = std::env::var("THRUM_SOCKET_PATH") {
        settings.server.socket_path = Some(v);
    }
    if let Ok(v) = std::env::var("THRUM_LOG") {
        settings.logging.filter = v;
    }
    settings
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_merges_nested_objects() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let patch = json!({"a": {"y": 20}});
        let merged = deep_merge(base, patch);
        assert_eq!(merged["a"]["x"], 1);
        assert_eq!(merged["a"]["y"], 20);
        assert_eq!(merged["b"], 3);
    }

    #[test]
    fn deep_merge_replaces_non_object_values() {
        let base = json!({"list": [1, 2, 3]});
        let patch = json!({"list": [9]});
        let merged = deep_merge(base, patch);
        assert_eq!(merged["list"], json!([9]));
    }

    #[test]
    fn load_settings_from_path_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"sync": {"branch": "custom-branch"}}"#).unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.sync.branch, "custom-branch");
        assert_eq!(settings.sync.interval_secs, 60);
    }

    #[test]
    fn load_settings_from_missing_path_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.sync.interval_secs, 60);
    }
}
