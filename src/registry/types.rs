//! Data types owned by the [`super::Registry`].
//!
//! Mirrors spec.md §3's data model: `HostLoad`'s sentinel for
//! not-yet-monitored hosts, and `WorkerRegistration`'s duplex connection
//! parked on a ready queue until a task-request handler consumes it.

use std::net::SocketAddr;

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Scaled load assigned to a host that has a registered worker but no
/// monitor report yet -- sorts last in least-loaded selection (spec.md §3,
/// §9: "Preserve this semantics").
pub const SENTINEL_LOAD: f64 = 1000.0;

/// A worker's duplex connection, parked on `Queues[workerType][host]`
/// until a task-request handler pops it.
///
/// `reader`/`writer` are the split halves of the worker's TCP connection;
/// the connection stays open and unread while parked (§4.3: "No further
/// reads happen here").
pub struct WorkerRegistration {
    pub task_type: String,
    pub worker_name: String,
    pub host: String,
    pub addr: SocketAddr,
    pub available_tools: Vec<String>,
    pub reader: BufReader<OwnedReadHalf>,
    pub writer: OwnedWriteHalf,
}

impl std::fmt::Debug for WorkerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistration")
            .field("task_type", &self.task_type)
            .field("worker_name", &self.worker_name)
            .field("host", &self.host)
            .field("addr", &self.addr)
            .field("available_tools", &self.available_tools)
            .finish_non_exhaustive()
    }
}
