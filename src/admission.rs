//! The admission event: a one-shot, set-once/wait-many latch.
//!
//! Grounded in spec.md §9's design note: "a tagged variant `{pending,
//! fired}` guarded by the Registry mutex with a condition variable, or a
//! one-shot channel ... is sufficient." Rust's `tokio::sync::Notify` plus
//! an atomic flag gives exactly that, without pulling the event itself
//! under the Registry's mutex -- the flag is what makes "already fired"
//! idempotent when the same event is popped off more than one platform
//! queue (the no-`requiredPlatform` fan-out case, spec.md §4.5/§4.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A single-fire latch shared between a `taskRequest` handler (the
/// waiter) and the Dispatcher (the signaler).
#[derive(Debug)]
pub struct AdmissionEvent {
    fired: AtomicBool,
    notify: Notify,
}

impl AdmissionEvent {
    /// Create a new, unsignaled event.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fired: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }

    /// Signal the event if it has not already fired.
    ///
    /// Returns `true` if this call was the one that fired it (the caller
    /// should count this as "progress made" this scan); `false` if some
    /// earlier pop (on another platform queue) already fired it, in which
    /// case this pop is a no-op discard.
    pub fn fire(&self) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.notify.notify_waiters();
            true
        } else {
            false
        }
    }

    /// True once [`fire`](Self::fire) has succeeded.
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Wait until the event fires. Resolves immediately if already fired.
    pub async fn wait(&self) {
        loop {
            if self.is_fired() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_fired() {
                return;
            }
            notified.await;
        }
    }
}
