//! The Dispatcher: the background task that releases queued task requests
//! once a capable host has spare load budget (spec.md §4.6).
//!
//! Grounded in `dispatcher()` in `taskManager_3_connections.py`: shuffle
//! platform order every scan (fairness across platforms), release at most
//! one event per platform per scan (prevents one overloaded host from
//! starving other platforms), and sleep a second once a full scan makes no
//! progress at all.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::metrics::Metrics;
use crate::registry::Registry;

const IDLE_SLEEP: Duration = Duration::from_secs(1);

/// Run the dispatcher loop forever (cancelled by aborting its `JoinHandle`
/// on shutdown).
pub async fn run(registry: Arc<Registry>, metrics: Arc<Metrics>) {
    loop {
        let progressed = scan_once(&registry, &metrics);
        if !progressed {
            tokio::time::sleep(IDLE_SLEEP).await;
        }
    }
}

/// Run exactly one scan over all known platforms in shuffled order,
/// releasing at most one admission event per platform. Returns whether
/// any event was released this scan.
fn scan_once(registry: &Registry, metrics: &Metrics) -> bool {
    metrics.record_dispatcher_scan();
    let mut platforms = registry.known_platforms();
    platforms.shuffle(&mut rand::thread_rng());

    let mut progressed = false;
    for platform in platforms {
        debug!(platform = %platform, "dispatcher scanning platform");
        if registry.try_release_one(&platform) {
            metrics.record_dispatcher_release();
            debug!(platform = %platform, "dispatcher released a task request");
            progressed = true;
        }
    }
    progressed
}
