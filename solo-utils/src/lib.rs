//! solo-utils: Common utilities shared across solo crates
//!
//! This crate provides:
//! - Unified error types ([`SoloError`], [`Result`])
//! - Logging infrastructure ([`init_logging_with_config`], [`LogConfig`], [`LogHandle`])
//! - The single-writer profile lock ([`WriterLock`])
//! - XDG-compliant path utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{Result, SoloError};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogHandle, LogOutput, WriterLock};

// Re-export commonly used path functions
pub use paths::{
    config_dir, config_file, crash_marker_file, data_dir, log_dir, log_file,
    runtime_dir, state_dir, update_ready_marker, writer_lock_file,
};
