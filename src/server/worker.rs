//! Worker handler (spec.md §4.3): register and park a worker's duplex
//! connection on its ready queue. No further reads happen here -- the
//! connection stays open, held by the queue, until a task-request handler
//! pops and consumes it.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info};

use crate::protocol::WorkerHello;
use crate::registry::WorkerRegistration;
use crate::Context;

pub async fn handle(
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    addr: SocketAddr,
    hello: Value,
    ctx: Arc<Context>,
) {
    ctx.metrics.record_worker_connection();
    let hello: WorkerHello = match serde_json::from_value(hello) {
        Ok(h) => h,
        Err(e) => {
            debug!(error = %e, %addr, "malformed worker hello");
            return;
        }
    };

    let worker_name = hello.worker_name();
    info!(
        task_type = %hello.task_type,
        host = %hello.host,
        worker = %worker_name,
        %addr,
        "worker registered",
    );

    ctx.registry.register_worker(WorkerRegistration {
        task_type: hello.task_type,
        worker_name,
        host: hello.host,
        addr,
        available_tools: hello.available_tools,
        reader,
        writer,
    });
}
