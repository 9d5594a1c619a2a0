//! Task-request handler (spec.md §4.5): admission, selection, increment
//! and relay phases.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;
use uuid::Uuid;

use crate::admission::AdmissionEvent;
use crate::protocol::TaskRequestHello;
use crate::Context;

pub async fn handle(
    _reader: BufReader<OwnedReadHalf>,
    mut client_writer: OwnedWriteHalf,
    addr: SocketAddr,
    raw_hello: String,
    hello_value: Value,
    ctx: Arc<Context>,
) {
    ctx.metrics.record_task_request_connection();
    // Correlates every log line this request produces across the
    // admission/selection/relay phases, independent of the task's own name.
    let request_id = Uuid::new_v4();

    let hello: TaskRequestHello = match serde_json::from_value(hello_value) {
        Ok(h) => h,
        Err(e) => {
            debug!(%request_id, error = %e, %addr, "malformed taskRequest hello");
            return;
        }
    };

    if hello.workers.is_empty() {
        debug!(%request_id, %addr, task = %hello.task_name, "taskRequest with empty workers list");
        return;
    }
    if let Some(platform) = &hello.required_platform {
        if !ctx.registry.has_platform(platform) {
            let err = crate::error::Error::UnknownPlatform(platform.clone());
            debug!(%request_id, %addr, task = %hello.task_name, %err, "rejecting taskRequest");
            return;
        }
    }

    // Admission phase: block until a capable host has spare load budget.
    let event = AdmissionEvent::new();
    match &hello.required_platform {
        Some(platform) => ctx.registry.enqueue_admission(platform, event.clone()),
        None => {
            if ctx.registry.known_platforms().is_empty() {
                debug!(%request_id, %addr, task = %hello.task_name, "no platforms known, taskRequest can never be admitted");
                return;
            }
            ctx.registry.enqueue_admission_all_known_platforms(event.clone());
        }
    }
    event.wait().await;

    // Selection phase: pick the least-loaded eligible host, retrying past
    // any worker whose parked connection has died.
    let mut worker = loop {
        let candidates = ctx
            .registry
            .eligible_candidates(&hello.workers, hello.required_platform.as_deref());
        if candidates.is_empty() {
            debug!(%request_id, %addr, task = %hello.task_name, "no eligible worker for taskRequest");
            return;
        }
        let (task_type, host) = ctx.registry.least_loaded(&candidates);
        let Some(mut registration) = ctx.registry.pop_worker(&task_type, &host) else {
            // Another handler won the race for this (type, host)'s head; retry.
            continue;
        };

        let mut payload = raw_hello.clone().into_bytes();
        payload.push(b'\n');
        if let Err(e) = registration.writer.write_all(&payload).await {
            debug!(
                %request_id, error = %e, host = %host, task_type = %task_type,
                "worker died while parked, retrying selection",
            );
            ctx.metrics.record_dead_worker_skipped();
            continue;
        }

        // Increment phase.
        ctx.registry.bump_host_load(&host, hello.estimated_load);
        break registration;
    };

    // Relay phase: forward worker output to the log sink; echo the
    // terminal record (the one carrying `returncode`, checked as an actual
    // JSON field, not a substring match) back to the client and stop.
    let mut line = String::new();
    loop {
        line.clear();
        match worker.reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(%request_id, error = %e, task = %hello.task_name, "worker relay read error");
                break;
            }
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        let record: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "malformed worker output line");
                continue;
            }
        };
        ctx.log_sink.send_raw(record.clone()).await;

        if record.get("returncode").is_some() {
            let mut out = trimmed.as_bytes().to_vec();
            out.push(b'\n');
            let _ = client_writer.write_all(&out).await;
            break;
        }
    }
    let _ = client_writer.shutdown().await;
}
