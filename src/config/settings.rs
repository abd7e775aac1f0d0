//! Persisted user settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::ConfigError;
use crate::schema::ConfigMap;

/// Saved endpoint for the `custom` LLM provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomEndpoint {
    pub base_url: String,
    #[serde(default)]
    pub model_name: String,
}

/// Settings shown and edited by the frontend.
///
/// Keys this version does not know about are kept and written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Provider id (`openai`, `gemini`, ...) to API key.
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_endpoint: Option<CustomEndpoint>,
    /// Default generation options.
    #[serde(default)]
    pub defaults: ConfigMap,
    #[serde(flatten)]
    pub extra: ConfigMap,
}

/// JSON file holding [`Settings`]. Writes are serialised.
pub struct SettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings; a missing file means defaults.
    pub async fn load(&self) -> Result<Settings, ConfigError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the stored settings.
    ///
    /// The file is written next to its final location and renamed into place.
    pub async fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "Saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_save_and_reload_keeps_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));

        let settings: Settings = serde_json::from_value(json!({
            "api_keys": { "openai": "sk-test" },
            "custom_endpoint": { "base_url": "http://localhost:8001/v1", "model_name": "mistral" },
            "theme": "dark"
        }))
        .unwrap();
        store.save(&settings).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.extra["theme"], "dark");
        assert_eq!(loaded.api_keys["openai"], "sk-test");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(SettingsStore::new(path).load().await, Err(ConfigError::Json(_))));
    }
}
