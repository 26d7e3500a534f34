//! Application settings.
//!
//! Settings are persisted as a JSON file. Missing keys fall back to their
//! defaults so older files keep loading after new settings are added.

use crate::error::AppError;
use crate::services::github_client::DEFAULT_API_URL;
use crate::services::tracker::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings filename inside the config directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// GitHub connection settings (the token is kept in the keychain, not here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    /// API root.
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum number of review requests to track.
    pub max_items: usize,

    /// Whether to fetch line/file counts and review request counts per PR.
    pub fetch_size_metrics: bool,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
            max_items: 100,
            fetch_size_metrics: true,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Poll loop configuration.
    pub tracker: TrackerConfig,

    /// GitHub connection.
    pub github: GitHubSettings,
}

impl AppSettings {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), AppError> {
        self.tracker.validate()?;

        if self.github.timeout_secs == 0 {
            return Err(AppError::config_field(
                "must be at least 1 second",
                "github.timeout_secs",
            ));
        }
        if self.github.max_items == 0 {
            return Err(AppError::config_field("must be at least 1", "github.max_items"));
        }
        let url = &self.github.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::config_field(
                format!("not an http(s) URL: {}", self.github.base_url),
                "github.base_url",
            ));
        }

        Ok(())
    }
}

/// Default settings path: `$XDG_CONFIG_HOME/pr-review-light/settings.json`,
/// falling back to `$HOME/.config/...`.
pub fn default_settings_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;

    Some(base.join("pr-review-light").join(SETTINGS_FILE))
}

/// Load settings from `path`, using defaults if the file does not exist.
pub fn load_settings(path: &Path) -> Result<AppSettings, AppError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("[config] No settings at {}, using defaults", path.display());
            return Ok(AppSettings::default());
        }
        Err(e) => return Err(e.into()),
    };

    let settings: AppSettings = serde_json::from_str(&contents)?;
    settings.validate()?;

    log::info!("[config] Loaded settings from {}", path.display());
    Ok(settings)
}

/// Save settings to `path`, creating parent directories as needed.
pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<(), AppError> {
    settings.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_settings(&dir.path().join(SETTINGS_FILE)).unwrap();

        assert_eq!(settings.tracker.poll_interval_secs, 60);
        assert_eq!(settings.tracker.snooze_duration_secs, 3600);
        assert_eq!(settings.github.base_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let mut settings = AppSettings::default();
        settings.tracker.poll_interval_secs = 120;
        settings.github.fetch_size_metrics = false;
        settings.github.base_url = "https://ghe.example.com/api/v3".to_string();
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded.tracker.poll_interval_secs, 120);
        assert!(!loaded.github.fetch_size_metrics);
        assert_eq!(loaded.github, settings.github);
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"tracker": {"snooze_duration_secs": 900}}"#).unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.tracker.snooze_duration_secs, 900);
        assert_eq!(settings.tracker.poll_interval_secs, 60);
        assert_eq!(settings.github.timeout_secs, 30);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_settings(&path).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"tracker": {"poll_interval_secs": 0}}"#).unwrap();

        match load_settings(&path) {
            Err(AppError::Config { field, .. }) => {
                assert_eq!(field.as_deref(), Some("poll_interval_secs"))
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_snooze_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"{"tracker": {"snooze_duration_secs": 18446744073709551615}}"#,
        )
        .unwrap();

        match load_settings(&path) {
            Err(AppError::Config { field, .. }) => {
                assert_eq!(field.as_deref(), Some("snooze_duration_secs"))
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let mut settings = AppSettings::default();
        settings.github.base_url = "api.github.com".to_string();
        assert!(settings.validate().is_err());
    }
}
