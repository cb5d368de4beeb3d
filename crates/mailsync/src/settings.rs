//! Settings file handling.

use std::path::{Path, PathBuf};

use anyhow::Context;
use mailsync_core::SyncConfig;
use serde::{Deserialize, Serialize};

/// Directory name under the platform config and data dirs.
const APP_DIR: &str = "mailsync";

/// Settings read from `settings.json`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database file; defaults to `<data_dir>/mailsync/mailsync.db`.
    pub database_path: Option<PathBuf>,
    /// Gmail API root override.
    pub gmail_api_base: Option<String>,
    /// Sync tunables.
    pub sync: SyncConfig,
}

impl Settings {
    /// Default location of the settings file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("settings.json")
    }

    /// Load settings from `path`. A missing file yields defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading settings from {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("parsing settings in {}", path.display()))
    }

    /// Resolve the database file, creating its directory.
    pub async fn database_path(&self) -> anyhow::Result<PathBuf> {
        let path = match &self.database_path {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("mailsync.db"),
        };

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(path)
    }
}
