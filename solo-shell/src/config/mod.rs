//! Configuration for the solo shell
//!
//! The config file supplies defaults; command-line flags override them.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{AppConfig, GeneralConfig, LoggingConfig, ProxyConfig, RelayConfig, UpdateConfig};

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Args;
use crate::endpoint::InstanceMode;

/// Effective launch settings after merging CLI and config
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub mode: InstanceMode,
    /// Directory hashed into the endpoint name
    pub working_dir: PathBuf,
    pub send_paths: Vec<String>,
    pub start_url: Option<String>,
    /// Whether a ready update may replace this launch
    pub start_update: bool,
    /// `None` waits forever
    pub response_timeout: Option<Duration>,
}

impl LaunchOptions {
    pub fn resolve(args: &Args, config: &AppConfig) -> Self {
        let working_dir = args
            .workdir
            .clone()
            .or_else(|| config.general.working_dir.clone())
            .unwrap_or_else(default_install_dir);

        let response_timeout = match config.relay.response_timeout_ms {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        };

        Self {
            mode: InstanceMode::from_flag(args.many || config.general.multi_instance),
            working_dir,
            send_paths: args.send_paths(),
            start_url: args.start_url.clone().filter(|url| !url.is_empty()),
            start_update: config.update.enabled && !args.no_start_update,
            response_timeout,
        }
    }
}

/// Directory containing the running executable
fn default_install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}
