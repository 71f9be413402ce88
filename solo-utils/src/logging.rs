//! Logging infrastructure for solo
//!
//! Provides unified logging setup using the tracing ecosystem.
//!
//! Logging starts before the process knows whether it is the primary
//! instance, so file output is deferred: the subscriber is installed with a
//! file layer whose target is attached later through [`LogHandle`]. Until a
//! file is attached, that layer discards its output.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, Result, SoloError};

/// Environment variable overriding the log filter
pub const LOG_ENV_VAR: &str = "SOLO_LOG";

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr only
    Stderr,
    /// Log to the attached file only
    File,
    /// Log to stderr and, once attached, the file
    Both,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "debug", "solo_shell=debug,tokio=warn")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
        }
    }
}

impl LogConfig {
    /// Create config for the shell process
    ///
    /// `SOLO_LOG` wins over the configured filter.
    pub fn shell(configured_filter: &str) -> Self {
        Self {
            output: LogOutput::Both,
            filter: std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| configured_filter.to_string()),
            span_events: false,
            file_line: true,
        }
    }

    fn wants_file(&self) -> bool {
        matches!(self.output, LogOutput::File | LogOutput::Both)
    }
}

/// Handle to the deferred log file of an installed subscriber
#[derive(Debug, Clone, Default)]
pub struct LogHandle {
    slot: Arc<Mutex<Option<File>>>,
    file_output: bool,
}

impl LogHandle {
    /// Handle whose subscriber has a file layer waiting for a file
    pub fn file_backed() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            file_output: true,
        }
    }

    /// Open `path` for appending and route file output to it
    pub fn attach_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent).map_err(|e| SoloError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SoloError::FileWrite {
                path: path.to_path_buf(),
                source: e,
            })?;

        *self.slot.lock() = Some(file);
        Ok(())
    }

    /// Whether file logging has started
    pub fn is_started(&self) -> bool {
        self.file_output && self.slot.lock().is_some()
    }

    /// Stop writing to the attached file
    pub fn detach_file(&self) {
        self.slot.lock().take();
    }

    fn make_writer(&self) -> DeferredFile {
        DeferredFile {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Writer factory that forwards to the attached file, if any
#[derive(Clone)]
struct DeferredFile {
    slot: Arc<Mutex<Option<File>>>,
}

struct DeferredFileWriter<'a> {
    guard: MutexGuard<'a, Option<File>>,
}

impl<'a> MakeWriter<'a> for DeferredFile {
    type Writer = DeferredFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        DeferredFileWriter {
            guard: self.slot.lock(),
        }
    }
}

impl Write for DeferredFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.guard.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.guard.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Exclusive claim on the profile's log writer
///
/// Held for the lifetime of the primary instance; dropping it releases the
/// underlying `flock`.
#[derive(Debug)]
pub struct WriterLock {
    _file: File,
    path: PathBuf,
}

impl WriterLock {
    /// Try to become the sole log writer without blocking
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent).map_err(|e| SoloError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| SoloError::FileWrite {
                path: path.to_path_buf(),
                source: e,
            })?;

        // SAFETY: the descriptor is owned by `file` and stays open for the call
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            return Err(if err.kind() == io::ErrorKind::WouldBlock {
                SoloError::ProfileLocked {
                    path: path.to_path_buf(),
                }
            } else {
                SoloError::FileWrite {
                    path: path.to_path_buf(),
                    source: err,
                }
            });
        }

        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<LogHandle> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<LogHandle> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| SoloError::config(format!("Invalid log filter: {}", e)))?;

    let handle = if config.wants_file() {
        LogHandle::file_backed()
    } else {
        LogHandle::default()
    };

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    } else {
        fmt_layer
    };

    let fmt_layer = if config.file_line {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer.with_file(false).with_line_number(false)
    };

    match config.output {
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| SoloError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::File => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(handle.make_writer()).with_ansi(false))
                .try_init()
                .map_err(|e| SoloError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::Both => {
            let file_layer = fmt::layer()
                .with_writer(handle.make_writer())
                .with_ansi(false)
                .with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .with(file_layer)
                .try_init()
                .map_err(|e| SoloError::internal(format!("Failed to init logging: {}", e)))?;
        }
    }

    Ok(handle)
}
