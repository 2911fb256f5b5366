use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Chat file used when `--chat` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_path: Option<PathBuf>,

    /// Settings file used when `--settings` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<PathBuf>,

    /// Pretty-print JSON results
    #[serde(default)]
    pub pretty: bool,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// `chatvars/cli.json` in the user's config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatvars").join("cli.json"))
    }

    /// Load the default config file if there is one
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config_with_paths() {
        let json = r#"{"chatPath": "/tmp/chat.jsonl", "settingsPath": "/tmp/s.json", "pretty": true}"#;
        let config: CliConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.chat_path, Some(PathBuf::from("/tmp/chat.jsonl")));
        assert_eq!(config.settings_path, Some(PathBuf::from("/tmp/s.json")));
        assert!(config.pretty);
    }

    #[test]
    fn test_parse_config_minimal() {
        let config: CliConfig = serde_json::from_str("{}").unwrap();
        assert!(config.chat_path.is_none());
        assert!(!config.pretty);
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cli.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = CliConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("cli.json"));
    }
}
