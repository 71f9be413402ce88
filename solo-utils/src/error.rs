//! Error types for solo
//!
//! Provides a unified error type used across all solo crates.

use std::path::PathBuf;

/// Main error type for solo operations
#[derive(Debug, thiserror::Error)]
pub enum SoloError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection closed before a response was received")]
    ConnectionClosed,

    #[error("No response from primary instance after {millis}ms")]
    ResponseTimeout { millis: u64 },

    #[error("Failed to listen on {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    // === Protocol Errors ===

    #[error("Protocol error: {0}")]
    Protocol(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Startup Errors ===

    #[error("Log writer for this profile is held by another process ({path})")]
    ProfileLocked { path: PathBuf },

    #[error("Startup failed: {0}")]
    Startup(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SoloError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a startup error
    pub fn startup(msg: impl Into<String>) -> Self {
        Self::Startup(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using SoloError
pub type Result<T> = std::result::Result<T, SoloError>;
