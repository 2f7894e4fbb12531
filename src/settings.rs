use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StormError};
use crate::fetch::DEFAULT_SOURCE_URL;

/// Overrides `cache_dir` from the settings file when set.
pub const CACHE_DIR_ENV: &str = "STORM_REPORT_CACHE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub cache_dir: String,
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_top")]
    pub top: usize,
}

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}

fn default_top() -> usize {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir().to_string_lossy().to_string(),
            source_url: default_source_url(),
            top: default_top(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("storm-report")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storm-report")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Settings::default()
        })
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| StormError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

/// The environment override wins over the settings file.
pub fn resolve_cache_dir(settings: &Settings, env_override: Option<String>) -> PathBuf {
    match env_override {
        Some(dir) if !dir.trim().is_empty() => PathBuf::from(shellexpand_path(dir.trim())),
        _ => PathBuf::from(&settings.cache_dir),
    }
}

pub fn get_cache_dir() -> PathBuf {
    resolve_cache_dir(&load_settings(), std::env::var(CACHE_DIR_ENV).ok())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            cache_dir: "/tmp/storm".to_string(),
            source_url: "https://example.org/StormData.csv.bz2".to_string(),
            top: 5,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.cache_dir, "/tmp/storm");
        assert_eq!(loaded.top, 5);
        assert_eq!(loaded.source_url, "https://example.org/StormData.csv.bz2");
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.top, 10);
        assert_eq!(s.source_url, DEFAULT_SOURCE_URL);
        assert!(s.cache_dir.ends_with("storm-report"));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"cache_dir": "/tmp/storm"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.top, 10);
        assert_eq!(s.source_url, DEFAULT_SOURCE_URL);
    }

    #[test]
    fn test_env_override_wins() {
        let s = Settings {
            cache_dir: "/from/settings".to_string(),
            ..Settings::default()
        };
        assert_eq!(resolve_cache_dir(&s, None), PathBuf::from("/from/settings"));
        assert_eq!(
            resolve_cache_dir(&s, Some("  ".to_string())),
            PathBuf::from("/from/settings")
        );
        assert_eq!(
            resolve_cache_dir(&s, Some("/from/env".to_string())),
            PathBuf::from("/from/env")
        );
    }
}
