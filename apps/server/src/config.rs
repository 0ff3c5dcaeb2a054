//! Transfer service configuration.
//!
//! Read as TOML from the file named by `FILEGATE_CONFIG`. Defaults are used
//! when the variable is unset or the file does not exist.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use filegate_protocol::DEFAULT_CHUNK_SIZE;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "FILEGATE_CONFIG";

/// Transfer service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// RPC listen address.
    pub listen_addr: String,

    /// Directory holding stored files. Created at startup if missing.
    pub storage_root: PathBuf,

    /// Download chunk size in bytes.
    pub chunk_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:50051".into(),
            storage_root: PathBuf::from("files"),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ServerConfig {
    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Reads `path`, falling back to defaults if it does not exist.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("FILEGATE_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(root) = lookup("FILEGATE_STORAGE_ROOT") {
            self.storage_root = PathBuf::from(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:50051");
        assert_eq!(config.storage_root, PathBuf::from("files"));
        assert_eq!(config.chunk_size, 1024);
    }

    #[test]
    fn config_partial_toml() {
        let config: ServerConfig = toml::from_str(r#"storage_root = "/srv/files""#).unwrap();
        assert_eq!(config.storage_root, PathBuf::from("/srv/files"));
        assert_eq!(config.listen_addr, "0.0.0.0:50051");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = ServerConfig {
            listen_addr: "127.0.0.1:6000".into(),
            storage_root: PathBuf::from("/tmp/store"),
            chunk_size: 4096,
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ServerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ServerConfig::from_file(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("server.toml");
        std::fs::write(&path, "listen_addr = [").unwrap();
        assert!(ServerConfig::from_file(&path).is_err());
    }

    #[test]
    fn env_overrides_replace_fields() {
        let mut config = ServerConfig::default();
        config.apply_overrides(|key| match key {
            "FILEGATE_STORAGE_ROOT" => Some("/data".into()),
            _ => None,
        });
        assert_eq!(config.storage_root, PathBuf::from("/data"));
        assert_eq!(config.listen_addr, "0.0.0.0:50051");
    }
}
