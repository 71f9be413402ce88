//! Path utilities for solo
//!
//! Handles XDG Base Directory specification compliance for config,
//! state, data, and runtime directories.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Application identifier for XDG directories
const APP_NAME: &str = "solo";

/// Get project directories
fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the runtime directory holding the instance endpoints
///
/// Location: `$XDG_RUNTIME_DIR/solo` or `/tmp/solo-$UID`
pub fn runtime_dir() -> PathBuf {
    if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(xdg_runtime).join(APP_NAME)
    } else {
        // Fallback to /tmp with UID for security
        // SAFETY: getuid() is always safe to call
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid))
    }
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/solo` or `~/.config/solo`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(fallback_config_dir)
}

/// Get the main configuration file path
///
/// Location: `$XDG_CONFIG_HOME/solo/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/solo` or `~/.local/state/solo`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(fallback_state_dir)
}

/// Get the data directory
///
/// Location: `$XDG_DATA_HOME/solo` or `~/.local/share/solo`
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(fallback_data_dir)
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/solo/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

/// Get the log file for this process
///
/// A multi-instance process logs to its own `solo-<pid>.log` so that it never
/// competes with the profile's sole writer.
pub fn log_file(multi_instance: bool) -> PathBuf {
    if multi_instance {
        log_dir().join(format!("solo-{}.log", std::process::id()))
    } else {
        log_dir().join("solo.log")
    }
}

/// Get the lock file that marks the profile's sole log writer
pub fn writer_lock_file() -> PathBuf {
    log_dir().join("solo.lock")
}

/// Get the crash marker written while a primary instance runs
///
/// Multi-instance processes track themselves in `running-<pid>` so a live
/// peer's marker is never mistaken for an unclean exit.
pub fn crash_marker_file(multi_instance: bool) -> PathBuf {
    if multi_instance {
        state_dir().join(format!("running-{}", std::process::id()))
    } else {
        state_dir().join("running")
    }
}

/// Get the marker that signals a downloaded update is ready to install
pub fn update_ready_marker() -> PathBuf {
    data_dir().join("update").join("ready")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

// Fallback implementations when ProjectDirs is unavailable

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn fallback_config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_NAME)
}

fn fallback_state_dir() -> PathBuf {
    home_dir().join(".local").join("state").join(APP_NAME)
}

fn fallback_data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join(APP_NAME)
}
