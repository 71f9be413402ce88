//! Configuration loader

use std::path::Path;

use solo_utils::{config_file, Result, SoloError};

use super::AppConfig;
use crate::proxy::{ProxyKind, ProxySettings};

/// Longest a secondary may wait for the primary's reply
const MAX_RESPONSE_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<AppConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(AppConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| SoloError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        toml::from_str(content).map_err(|e| SoloError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.relay.response_timeout_ms > MAX_RESPONSE_TIMEOUT_MS {
            return Err(SoloError::config(
                "response_timeout_ms must be at most 600000 (10 minutes)",
            ));
        }

        let proxy = &config.proxy;
        if proxy.settings == ProxySettings::Enabled && proxy.selected.kind != ProxyKind::None {
            if proxy.selected.host.is_empty() {
                return Err(SoloError::config("enabled proxy needs a host"));
            }
            if proxy.selected.port == 0 {
                return Err(SoloError::config("enabled proxy needs a non-zero port"));
            }
        }

        Ok(())
    }

    /// Load from `path` (or the default location) and validate
    pub fn load_and_validate(path: Option<&Path>) -> Result<AppConfig> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        Self::validate(&config)?;
        Ok(config)
    }
}
