//! Configuration for the taskmanager coordinator.
//!
//! Loaded from an optional YAML file on startup. Every field has a
//! sensible default so the coordinator can be started with no config at
//! all; a named-but-unreadable file is a fatal startup error.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Listener settings.
    pub task_manager: TaskManagerSection,
    /// Outbound log-sink connection settings.
    pub cutelog_actions: CutelogActionsSection,
    /// File paths advertised to clients via the query reply.
    pub files: FilesSection,
    /// Local (tracing) logging settings.
    pub logging: LoggingSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            task_manager: TaskManagerSection::default(),
            cutelog_actions: CutelogActionsSection::default(),
            files: FilesSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

/// `taskManager.*` settings: the listen interface and port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskManagerSection {
    /// Interface to bind (default: all interfaces).
    pub interface: String,
    /// TCP port to listen on.
    pub port: u16,
}

impl Default for TaskManagerSection {
    fn default() -> Self {
        Self {
            interface: "0.0.0.0".to_string(),
            port: 8888,
        }
    }
}

/// `cutelogActions.*` settings: where the one-way log viewer lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CutelogActionsSection {
    /// Hostname of the log viewer.
    pub host: String,
    /// Port of the log viewer.
    pub port: u16,
    /// Connection attempts (one per second) before degrading to stdout
    /// logging for the rest of the process's life (spec.md §4.7).
    pub retry_attempts: u32,
}

impl Default for CutelogActionsSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 19996,
            retry_attempts: 60,
        }
    }
}

/// `files.*` settings: paths advertised to clients via `workerQuery`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FilesSection {
    /// The coordinator's local base path.
    pub orig: Option<String>,
    /// The worker-visible base path.
    pub dest: Option<String>,
}

/// `logging.*` settings for the local `tracing` subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    /// Default `tracing` filter directive, overridden by `-v` flags.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or fall back to defaults.
    ///
    /// - `Some(path)`: the file MUST exist and parse; any failure is a
    ///   fatal startup error.
    /// - `None`: try `./taskManager.yaml`, silently falling back to
    ///   [`Config::default`] if it is absent. This lets the coordinator be
    ///   smoke-tested with no config file at all.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let default_path = Path::new("taskManager.yaml");
                if default_path.exists() {
                    Self::load_from(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&contents).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
