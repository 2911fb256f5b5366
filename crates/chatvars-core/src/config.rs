use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants::{MIRROR_POLL_INTERVAL_MS, SAVE_DEBOUNCE_MS, SETTINGS_FILE_NAME};

/// User-facing settings for message variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageVariableSettings {
    /// Mirror the newest non-system message's variables into chat metadata
    #[serde(alias = "updateChatVars")]
    pub mirror_latest_to_metadata: bool,
    pub poll_interval_ms: u64,
    pub save_debounce_ms: u64,
}

impl Default for MessageVariableSettings {
    fn default() -> Self {
        Self {
            mirror_latest_to_metadata: true,
            poll_interval_ms: MIRROR_POLL_INTERVAL_MS,
            save_debounce_ms: SAVE_DEBOUNCE_MS,
        }
    }
}

impl MessageVariableSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

/// Settings handle shared by commands and the mirror loop.
/// Read on every operation, so edits take effect immediately.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<MessageVariableSettings>>,
}

impl SharedSettings {
    pub fn new(settings: MessageVariableSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn get(&self) -> MessageVariableSettings {
        self.inner.read().clone()
    }

    pub fn mirror_enabled(&self) -> bool {
        self.inner.read().mirror_latest_to_metadata
    }

    pub fn update<F: FnOnce(&mut MessageVariableSettings)>(&self, f: F) {
        f(&mut self.inner.write());
    }
}

/// Settings persisted to a JSON file
pub struct SettingsStorage {
    path: PathBuf,
    settings: SharedSettings,
}

impl SettingsStorage {
    /// Load settings from `path`. A missing or unreadable file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let settings = Self::load_from_file(&path).unwrap_or_default();
        Self {
            path,
            settings: SharedSettings::new(settings),
        }
    }

    /// Settings file in the user's config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatvars").join(SETTINGS_FILE_NAME))
    }

    fn load_from_file(path: &Path) -> Option<MessageVariableSettings> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn settings(&self) -> SharedSettings {
        self.settings.clone()
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings.get())?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` and write the result back to disk
    pub fn update<F: FnOnce(&mut MessageVariableSettings)>(&self, f: F) -> anyhow::Result<()> {
        self.settings.update(f);
        self.save()
    }
}
