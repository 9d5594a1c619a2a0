//! Wire protocol types.
//!
//! Every inbound connection begins with exactly one newline-delimited JSON
//! "hello frame" whose `type` field selects the sub-protocol (§4.1, §6 of
//! the design). Hello frames are deserialized manually rather than through
//! a single internally-tagged enum: the coordinator needs the raw hello
//! line (to forward verbatim to the selected worker for `taskRequest`)
//! alongside the typed view, and the four variants share almost no fields.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_max_load() -> f64 {
    1.0
}

fn default_estimated_load() -> f64 {
    0.5
}

/// `type="monitor"` hello frame.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorHello {
    pub host: String,
    pub platform: String,
    pub cpu_type: String,
    #[serde(default = "default_max_load")]
    pub max_load: f64,
}

/// A single load-average record a monitor streams after its hello frame.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorRecord {
    pub num_cpus: u32,
    pub wl_one: f64,
    #[serde(default)]
    pub wl_five: Option<f64>,
    #[serde(default)]
    pub wl_fifteen: Option<f64>,
    pub scale: f64,
}

/// `type="worker"` hello frame.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerHello {
    pub task_type: String,
    pub host: String,
    #[serde(default)]
    pub worker_name: Option<String>,
    #[serde(default)]
    pub available_tools: Vec<String>,
}

impl WorkerHello {
    /// The effective worker name: the declared name, or `taskType` when absent.
    pub fn worker_name(&self) -> String {
        self.worker_name.clone().unwrap_or_else(|| self.task_type.clone())
    }
}

/// One action in a `taskRequest`'s `actions` list: either a pre-joined
/// command string, or a list of argv tokens to be joined by the worker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Action {
    /// A list of argv tokens.
    Argv(Vec<String>),
    /// A pre-formed command string.
    Command(String),
}

/// `type="taskRequest"` hello frame.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequestHello {
    pub task_name: String,
    pub workers: Vec<String>,
    #[serde(default)]
    pub required_platform: Option<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    #[serde(default = "default_estimated_load")]
    pub estimated_load: f64,
}

/// Reply to a `type="workerQuery"` hello frame (§4.4).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerQueryReply {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub host_types: HashMap<String, Vec<String>>,
    pub host_loads: HashMap<String, f64>,
    pub workers: Vec<String>,
    pub tools: HashMap<String, Vec<String>>,
    pub files: FilesReply,
    pub platform_queues_empty: HashMap<String, bool>,
}

/// `files` block of a query reply, mirroring [`crate::config::FilesSection`].
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct FilesReply {
    pub orig: Option<String>,
    pub dest: Option<String>,
}

/// Canonicalize a monitor's `(platform, cpuType)` pair into the platform
/// tag used as the admission-queue / host-type bucket key.
pub fn platform_tag(platform: &str, cpu_type: &str) -> String {
    format!("{}-{}", platform.to_lowercase(), cpu_type.to_lowercase())
}
