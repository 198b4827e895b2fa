//! Layered configuration for the board link
//!
//! Priority (highest to lowest):
//! 1. Environment variables prefixed `BOARD_LINK_`, `__` separating sections
//!    (e.g. `BOARD_LINK_NETWORK__PORT=9421`)
//! 2. JSON config file, if given
//! 3. Built-in defaults

use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Json, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "BOARD_LINK_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub network: NetworkConfig,
    pub polling: PollingConfig,
    pub history: HistoryConfig,
    pub protocol: ProtocolConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_secs: f64,
    /// Bound on each send and each receive
    pub socket_timeout_secs: f64,
    /// Size of the single read performed per exchange
    pub receive_buffer: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9420,
            connect_timeout_secs: 3.0,
            socket_timeout_secs: 3.0,
            receive_buffer: 1024,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        secs(self.connect_timeout_secs)
    }

    pub fn socket_timeout(&self) -> Duration {
        secs(self.socket_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Start the status poller on every connect
    pub enabled: bool,
    pub interval_secs: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 1.0,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Samples kept per status series
    pub max_length: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_length: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Reject responses with a bad checksum or footer
    pub verify_checksum: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Operator log file, written alongside stdout when set
    pub file: Option<PathBuf>,
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

/// Reject anything that does not convert to a non-zero Duration
fn positive(name: &str, value: f64) -> Result<()> {
    match Duration::try_from_secs_f64(value) {
        Ok(d) if !d.is_zero() => Ok(()),
        _ => bail!("{} must be a positive number of seconds, got {}", name, value),
    }
}

impl LinkConfig {
    /// Load defaults, then the optional JSON file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(LinkConfig::default()));

        if let Some(path) = path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Json::file(path));
        }

        let config: LinkConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to load configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        positive("network.connect_timeout_secs", self.network.connect_timeout_secs)?;
        positive("network.socket_timeout_secs", self.network.socket_timeout_secs)?;
        positive("polling.interval_secs", self.polling.interval_secs)?;
        if self.network.receive_buffer == 0 {
            bail!("network.receive_buffer must be at least 1 byte");
        }
        if self.history.max_length == 0 {
            bail!("history.max_length must be at least 1");
        }
        Ok(())
    }

    /// Write this configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
