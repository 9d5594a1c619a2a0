//! Connection acceptance and hello-frame dispatch (spec.md §4.1).

pub mod monitor;
pub mod query;
pub mod task_request;
pub mod worker;

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::Context;

/// Handle one accepted connection end to end: read the hello frame, parse
/// its `type`, and dispatch to the matching sub-protocol handler. Every
/// exit path -- including every parse failure -- drops the connection.
pub async fn handle(stream: TcpStream, addr: SocketAddr, ctx: Arc<Context>) {
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => return,
        Ok(_) => {}
        Err(e) => {
            debug!(error = %e, %addr, "failed reading hello frame");
            return;
        }
    }
    let raw_hello = line.trim_end().to_string();
    if raw_hello.is_empty() {
        return;
    }

    let value: Value = match serde_json::from_str(&raw_hello) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, %addr, "malformed hello frame");
            return;
        }
    };

    match value.get("type").and_then(Value::as_str) {
        Some("monitor") => monitor::handle(reader, write_half, addr, value, ctx).await,
        Some("worker") => worker::handle(reader, write_half, addr, value, ctx).await,
        Some("workerQuery") => query::handle(write_half, ctx).await,
        Some("taskRequest") => {
            task_request::handle(reader, write_half, addr, raw_hello, value, ctx).await
        }
        other => debug!(?other, %addr, "unknown or missing hello frame type"),
    }
}
