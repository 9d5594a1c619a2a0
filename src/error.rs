//! Error types for taskfarm.
//!
//! This module defines the error types used throughout the coordinator,
//! covering startup failures (config, bind) and the handful of fallible
//! Registry operations. Per-connection protocol errors are logged and the
//! connection is closed rather than propagated as `Result` (see
//! `server::conn`) -- a malformed hello frame from one client must never
//! surface as a crate-level error.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for taskfarm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for taskfarm.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or parse the YAML configuration file.
    #[error("failed to load config '{path}': {message}")]
    Config {
        /// Path to the config file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Failed to bind the TCP listen socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the coordinator tried to bind
        addr: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Requested platform tag is unknown (no monitor has registered it).
    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),
}
