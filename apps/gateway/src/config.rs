//! Gateway configuration.
//!
//! Read as TOML from the file named by `FILEGATE_CONFIG`. Defaults are used
//! when the variable is unset or the file does not exist.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use filegate_gateway::DEFAULT_MAX_UPLOAD_BYTES;
use filegate_protocol::DEFAULT_CHUNK_SIZE;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "FILEGATE_CONFIG";

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listen address.
    pub listen_addr: String,

    /// Address of the transfer service.
    pub backend_addr: String,

    /// Upload chunk size in bytes.
    pub chunk_size: usize,

    /// Limit on opening a connection to the transfer service, so an
    /// unreachable backend answers 500 instead of hanging. This is the only
    /// timeout: list, upload and download calls run unbounded once connected.
    pub connect_timeout_secs: u64,

    /// Largest accepted upload request body.
    pub max_upload_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".into(),
            backend_addr: "127.0.0.1:50051".into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout_secs: 10,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl GatewayConfig {
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

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("FILEGATE_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(addr) = lookup("FILEGATE_BACKEND_ADDR") {
            self.backend_addr = addr;
        }
    }
}
