/// Engine configuration.
/// Reads config.json from ~/.config/tasknest/config.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::drag::DropPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Workspace snapshot file. Falls back to `default_data_path()`.
    #[serde(default)]
    pub data_file: Option<PathBuf>,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default)]
    pub drop_policy: DropPolicy,
}

fn default_event_capacity() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            event_capacity: default_event_capacity(),
            drop_policy: DropPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn data_path(&self) -> PathBuf {
        self.data_file.clone().unwrap_or_else(default_data_path)
    }
}

fn tasknest_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tasknest")
}

/// Default config path: ~/.config/tasknest/config.json
pub fn default_config_path() -> PathBuf {
    tasknest_dir().join("config.json")
}

/// Default snapshot path: ~/.config/tasknest/boards.json
pub fn default_data_path() -> PathBuf {
    tasknest_dir().join("boards.json")
}

/// Load config from path. Returns default if file doesn't exist.
pub fn load_config(path: &Path) -> EngineConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                "[tasknest.config] Failed to parse config {}: {}",
                path.display(),
                e
            );
            EngineConfig::default()
        }),
        Err(_) => {
            log::info!(
                "[tasknest.config] No config at {}, using defaults",
                path.display()
            );
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.json"));
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.event_capacity, 64);
        assert_eq!(config.drop_policy, DropPolicy::KeepLastMove);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"dropPolicy": "revert_on_cancel", "dataFile": "/tmp/b.json"}"#,
        )
        .unwrap();
        let config = load_config(&path);
        assert_eq!(config.drop_policy, DropPolicy::RevertOnCancel);
        assert_eq!(config.data_path(), PathBuf::from("/tmp/b.json"));
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        assert_eq!(load_config(&path), EngineConfig::default());
    }

    #[test]
    fn test_default_data_path_is_under_tasknest() {
        let path = EngineConfig::default().data_path();
        assert!(path.ends_with("tasknest/boards.json"));
    }
}
