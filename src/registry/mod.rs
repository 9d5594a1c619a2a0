//! The Registry: in-memory fleet state (spec.md §3).
//!
//! A single `parking_lot::Mutex` guards the whole of it, per spec.md §5's
//! "shared-resource policy" and §9's design note ("one mutex around the
//! whole Registry ... contention is not the bottleneck"). No lock is ever
//! held across an `.await` point -- callers take the lock, do the pure
//! bookkeeping, and release it before any network I/O.

pub mod types;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::admission::AdmissionEvent;
use crate::config::FilesSection;
use crate::protocol::{FilesReply, WorkerQueryReply};

pub use types::{WorkerRegistration, SENTINEL_LOAD};

/// In-memory fleet state shared by every connection handler and the
/// Dispatcher.
pub struct Registry {
    inner: Mutex<Inner>,
}

struct Inner {
    /// `platform -> host -> maxScaledLoad`.
    host_types: HashMap<String, HashMap<String, f64>>,
    /// `host -> most recent scaled one-minute load`.
    host_loads: HashMap<String, f64>,
    /// `workerType -> host -> FIFO of parked workers`.
    queues: HashMap<String, HashMap<String, VecDeque<WorkerRegistration>>>,
    /// `platform -> FIFO of pending admission events`.
    platform_queues: HashMap<String, VecDeque<Arc<AdmissionEvent>>>,
    files: FilesSection,
}

impl Registry {
    /// Create an empty Registry, advertising `files` to query replies.
    pub fn new(files: FilesSection) -> Self {
        Self {
            inner: Mutex::new(Inner {
                host_types: HashMap::new(),
                host_loads: HashMap::new(),
                queues: HashMap::new(),
                platform_queues: HashMap::new(),
                files,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Monitor handler (§4.2)
    // ------------------------------------------------------------------

    /// Register (or re-affirm) a monitor for `host` on `platform`.
    pub fn register_monitor(&self, platform: &str, host: &str, max_load: f64) {
        let mut inner = self.inner.lock();
        inner
            .host_types
            .entry(platform.to_string())
            .or_default()
            .entry(host.to_string())
            .or_insert(max_load);
        inner.platform_queues.entry(platform.to_string()).or_default();
    }

    /// Record a freshly-computed scaled load for `host`.
    pub fn update_host_load(&self, host: &str, scaled: f64) {
        self.inner.lock().host_loads.insert(host.to_string(), scaled);
    }

    /// Remove a disconnected monitor's host from `HostTypes`/`HostLoad`.
    /// The platform's admission queue is left in place -- workers on that
    /// platform may still be parked (§4.2).
    pub fn remove_monitor(&self, platform: &str, host: &str) {
        let mut inner = self.inner.lock();
        if let Some(hosts) = inner.host_types.get_mut(platform) {
            hosts.remove(host);
            if hosts.is_empty() {
                inner.host_types.remove(platform);
            }
        }
        inner.host_loads.remove(host);
    }

    // ------------------------------------------------------------------
    // Worker handler (§4.3)
    // ------------------------------------------------------------------

    /// Park a worker registration on `Queues[taskType][host]`, creating
    /// the sentinel host load if no monitor has reported for this host yet
    /// (Invariant 1).
    pub fn register_worker(&self, registration: WorkerRegistration) {
        let mut inner = self.inner.lock();
        let host = registration.host.clone();
        inner.host_loads.entry(host.clone()).or_insert(SENTINEL_LOAD);
        inner
            .queues
            .entry(registration.task_type.clone())
            .or_default()
            .entry(host)
            .or_default()
            .push_back(registration);
    }

    // ------------------------------------------------------------------
    // Query handler (§4.4)
    // ------------------------------------------------------------------

    /// Build a one-shot snapshot reply describing current fleet state.
    /// `ToolIndex` is recomputed from currently-parked workers rather than
    /// tracked monotonically (spec.md §9, preferred option (b) -- this way
    /// it self-heals as workers disconnect instead of growing forever).
    pub fn snapshot_for_query(&self) -> WorkerQueryReply {
        let inner = self.inner.lock();

        let mut workers_with_hosts: HashMap<String, HashSet<String>> = HashMap::new();
        let mut tools: HashMap<String, HashSet<String>> = HashMap::new();
        for (worker_type, by_host) in &inner.queues {
            for (host, queue) in by_host {
                if queue.is_empty() {
                    continue;
                }
                workers_with_hosts
                    .entry(worker_type.clone())
                    .or_default()
                    .insert(host.clone());
                for registration in queue {
                    for tool in &registration.available_tools {
                        tools.entry(tool.clone()).or_default().insert(worker_type.clone());
                    }
                }
            }
        }

        let mut host_types: HashMap<String, Vec<String>> = HashMap::new();
        for (platform, hosts) in &inner.host_types {
            let mut worker_types: HashSet<String> = HashSet::new();
            for host in hosts.keys() {
                for (worker_type, hosts_with_worker) in &workers_with_hosts {
                    if hosts_with_worker.contains(host) {
                        worker_types.insert(worker_type.clone());
                    }
                }
            }
            host_types.insert(platform.clone(), sorted(worker_types));
        }

        let workers: Vec<String> = sorted(workers_with_hosts.keys().cloned().collect());
        let tools: HashMap<String, Vec<String>> =
            tools.into_iter().map(|(tool, types)| (tool, sorted(types))).collect();

        let platform_queues_empty = inner
            .platform_queues
            .iter()
            .map(|(platform, queue)| (platform.clone(), queue.is_empty()))
            .collect();

        WorkerQueryReply {
            kind: "workerQuery",
            host_types,
            host_loads: inner.host_loads.clone(),
            workers,
            tools,
            files: FilesReply {
                orig: inner.files.orig.clone(),
                dest: inner.files.dest.clone(),
            },
            platform_queues_empty,
        }
    }

    // ------------------------------------------------------------------
    // Task-request handler (§4.5)
    // ------------------------------------------------------------------

    /// True if at least one monitor for `platform` has connected since
    /// startup (Invariant 2).
    pub fn has_platform(&self, platform: &str) -> bool {
        self.inner.lock().platform_queues.contains_key(platform)
    }

    /// Enqueue `event` onto a single platform's admission queue.
    pub fn enqueue_admission(&self, platform: &str, event: Arc<AdmissionEvent>) {
        self.inner
            .lock()
            .platform_queues
            .entry(platform.to_string())
            .or_default()
            .push_back(event);
    }

    /// Enqueue `event` onto every currently-known platform's admission
    /// queue (the no-`requiredPlatform` fan-out case; exactly one platform
    /// will fire it, spec.md §4.5/§4.6).
    pub fn enqueue_admission_all_known_platforms(&self, event: Arc<AdmissionEvent>) {
        let mut inner = self.inner.lock();
        let platforms: Vec<String> = inner.platform_queues.keys().cloned().collect();
        for platform in platforms {
            inner
                .platform_queues
                .get_mut(&platform)
                .expect("platform key was just read from this map")
                .push_back(event.clone());
        }
    }

    /// All `(workerType, host)` pairs with at least one parked worker,
    /// drawn from `requested_workers` and (if set) restricted to hosts of
    /// `required_platform`. Preserves the order `requested_workers` was
    /// given in, then host-map iteration order, matching spec.md §4.5's
    /// "first element encountered in E" tie-break.
    pub fn eligible_candidates(
        &self,
        requested_workers: &[String],
        required_platform: Option<&str>,
    ) -> Vec<(String, String)> {
        let inner = self.inner.lock();
        let mut candidates = Vec::new();
        for worker_type in requested_workers {
            let Some(by_host) = inner.queues.get(worker_type) else {
                continue;
            };
            for (host, queue) in by_host {
                if queue.is_empty() {
                    continue;
                }
                if let Some(platform) = required_platform {
                    let on_platform = inner
                        .host_types
                        .get(platform)
                        .is_some_and(|hosts| hosts.contains_key(host));
                    if !on_platform {
                        continue;
                    }
                }
                candidates.push((worker_type.clone(), host.clone()));
            }
        }
        candidates
    }

    /// The host with the minimum `HostLoad` among `candidates`. Panics if
    /// `candidates` is empty -- callers must check first.
    pub fn least_loaded(&self, candidates: &[(String, String)]) -> (String, String) {
        let inner = self.inner.lock();
        let load_of = |host: &str| inner.host_loads.get(host).copied().unwrap_or(SENTINEL_LOAD);
        candidates
            .iter()
            .min_by(|a, b| load_of(&a.1).total_cmp(&load_of(&b.1)))
            .cloned()
            .expect("caller must ensure candidates is non-empty")
    }

    /// Pop one worker registration from `Queues[taskType][host]`. Atomic
    /// with respect to other task-request handlers: the lock covers the
    /// pop, so two handlers never claim the same worker (Invariant 4).
    pub fn pop_worker(&self, task_type: &str, host: &str) -> Option<WorkerRegistration> {
        self.inner
            .lock()
            .queues
            .get_mut(task_type)
            .and_then(|by_host| by_host.get_mut(host))
            .and_then(|queue| queue.pop_front())
    }

    /// Add `amount` to `host`'s current load (the fudge factor applied
    /// after dispatch, spec.md §4.5 increment phase).
    pub fn bump_host_load(&self, host: &str, amount: f64) {
        let mut inner = self.inner.lock();
        *inner.host_loads.entry(host.to_string()).or_insert(SENTINEL_LOAD) += amount;
    }

    /// Current scaled load for `host`, or the sentinel if unknown.
    pub fn host_load(&self, host: &str) -> f64 {
        self.inner.lock().host_loads.get(host).copied().unwrap_or(SENTINEL_LOAD)
    }

    // ------------------------------------------------------------------
    // Dispatcher (§4.6)
    // ------------------------------------------------------------------

    /// Snapshot of all known platform tags (admission queues that exist).
    pub fn known_platforms(&self) -> Vec<String> {
        self.inner.lock().platform_queues.keys().cloned().collect()
    }

    /// Try to release one admission event on `platform`: find a host with
    /// `HostLoad[h] < maxLoad[h]` and a non-empty queue, pop the head, and
    /// fire it if it hasn't already fired on another platform's queue.
    ///
    /// Mirrors `dispatcher()` in `taskManager_3_connections.py` exactly:
    /// a host with insufficient capacity is skipped without touching the
    /// queue; an already-fired event popped off the head is discarded and
    /// the scan continues to the next host on this platform (it does not
    /// stop at the first capable host). Returns `true` the moment a
    /// not-yet-fired event is found and signaled -- at most one release
    /// per platform per scan (§4.6).
    pub fn try_release_one(&self, platform: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(hosts) = inner.host_types.get(platform) else {
            return false;
        };
        let candidates: Vec<(String, f64)> =
            hosts.iter().map(|(h, m)| (h.clone(), *m)).collect();

        for (host, max_load) in candidates {
            let load = inner.host_loads.get(&host).copied().unwrap_or(SENTINEL_LOAD);
            if load >= max_load {
                continue;
            }
            let Some(queue) = inner.platform_queues.get_mut(platform) else {
                continue;
            };
            let Some(event) = queue.pop_front() else {
                continue;
            };
            if event.fire() {
                return true;
            }
            // Already fired on another platform's queue: discard and keep
            // scanning this platform's remaining hosts in this scan.
        }
        false
    }
}

fn sorted(set: HashSet<String>) -> Vec<String> {
    let mut values: Vec<String> = set.into_iter().collect();
    values.sort();
    values
}
