//! Configuration schema structs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::proxy::{ProxyData, ProxySettings};

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub relay: RelayConfig,
    pub proxy: ProxyConfig,
    pub update: UpdateConfig,
    pub logging: LoggingConfig,
}

/// General settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Allow several primaries side by side
    pub multi_instance: bool,
    /// Directory hashed into the endpoint name (defaults to the install dir)
    pub working_dir: Option<PathBuf>,
}

/// Instance-to-instance relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// How long a secondary waits for the primary's reply; 0 waits forever
    pub response_timeout_ms: u64,
    /// URLs starting with one of these open without raising the window
    pub silent_url_prefixes: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 10_000,
            silent_url_prefixes: Vec::new(),
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub settings: ProxySettings,
    #[serde(flatten)]
    pub selected: ProxyData,
}

/// Update settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Install a downloaded update instead of starting
    pub enabled: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `SOLO_LOG`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}
