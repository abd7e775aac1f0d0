//! Server configuration and persisted settings.
//!
//! [`ServerConfig`] is built by the CLI from flags and `SYNTH_FORGE_*`
//! environment variables. [`SettingsStore`] persists user settings (saved API
//! keys and defaults) as a JSON file.

pub mod settings;

pub use settings::{CustomEndpoint, Settings, SettingsStore};

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_SETTINGS_FILE: &str = "./data/settings.json";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

/// Resolved configuration of the HTTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root for file-based data sources, uploads and file listings.
    pub data_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Mount point of the REST API, e.g. `/api/v1`.
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            settings_file: PathBuf::from(DEFAULT_SETTINGS_FILE),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "port".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "host".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if !self.api_prefix.starts_with('/') || (self.api_prefix.len() > 1 && self.api_prefix.ends_with('/')) {
            return Err(ConfigError::InvalidValue {
                key: "api_prefix".to_string(),
                message: format!("'{}' must start with '/' and not end with one", self.api_prefix),
            });
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "host".to_string(),
                message: format!("'{}' is not a valid IP address", self.host),
            })
    }

    /// Resolves `relative` inside the data directory.
    ///
    /// Absolute paths and paths climbing out with `..` are rejected.
    pub fn resolve_in_data_dir(&self, relative: &str) -> Result<PathBuf, ConfigError> {
        resolve_within(&self.data_dir, relative)
    }
}

/// Joins `relative` onto `root`, refusing anything that would escape it.
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf, ConfigError> {
    let candidate = Path::new(relative);
    let mut resolved = root.to_path_buf();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ConfigError::PathOutsideDataDir(relative.to_string()));
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.socket_addr().unwrap().port(), 8000);
    }

    #[test]
    fn test_invalid_values() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { ref key, .. }) if key == "port"));

        let config = ServerConfig {
            api_prefix: "api".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_paths_stay_in_data_dir() {
        let config = ServerConfig {
            data_dir: PathBuf::from("/srv/data"),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_in_data_dir("docs/./a.txt").unwrap(),
            PathBuf::from("/srv/data/docs/a.txt")
        );
        assert_eq!(config.resolve_in_data_dir("").unwrap(), PathBuf::from("/srv/data"));
        assert!(matches!(
            config.resolve_in_data_dir("../etc/passwd"),
            Err(ConfigError::PathOutsideDataDir(_))
        ));
        assert!(config.resolve_in_data_dir("/etc/passwd").is_err());
    }
}
