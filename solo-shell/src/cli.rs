//! Command-line argument parsing for solo
//!
//! Uses clap for argument parsing with derive macros.

use clap::Parser;
use std::path::{Path, PathBuf};

/// solo - single-instance application shell
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Allow this launch to run beside an existing instance
    #[arg(long, default_value_t = false)]
    pub many: bool,

    /// Directory used to tell installs apart
    ///
    /// Launches from the same directory share one primary instance.
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// File to hand to the running instance (repeatable)
    #[arg(long = "sendpath", value_name = "PATH")]
    pub sendpath: Vec<PathBuf>,

    /// Start normally even if a downloaded update is ready
    #[arg(long, default_value_t = false)]
    pub no_start_update: bool,

    /// Configuration file (defaults to the XDG config location)
    #[arg(long, env = "SOLO_CONFIG")]
    pub config: Option<PathBuf>,

    /// URL to open in the running instance
    pub start_url: Option<String>,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Send paths as absolute strings
    ///
    /// The primary resolves paths against its own working directory, so
    /// relative paths are made absolute here.
    pub fn send_paths(&self) -> Vec<String> {
        let cwd = std::env::current_dir().ok();
        self.sendpath
            .iter()
            .map(|path| absolutize(path, cwd.as_deref()))
            .map(|path| path.to_string_lossy().into_owned())
            .collect()
    }
}

fn absolutize(path: &Path, cwd: Option<&Path>) -> PathBuf {
    match cwd {
        Some(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    }
}
