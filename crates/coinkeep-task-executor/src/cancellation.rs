//! Cancellation Handle: cooperative cancellation for background work.
//!
//! Cancellation is advisory: the executor flips the handle, and the running
//! work is expected to poll it. Work that never looks at the handle runs to
//! completion, and only its result delivery is suppressed.

use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Granularity of [`CancellationHandle::sleep_unless_cancelled`].
const SLEEP_SLICE: Duration = Duration::from_millis(5);

/// A cooperative cancellation handle shared between the executor and the
/// work it runs.
///
/// Wraps a `tokio::sync::watch` channel so both blocking and async work can
/// observe the signal. Clone-friendly: the executor keeps one copy in the
/// pending handle, the background closure receives a reference to another.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl CancellationHandle {
    /// Create a new (not-yet-cancelled) handle.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is requested.
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // wait_for checks the current value first
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Block the current thread for `duration`, waking early on cancellation.
    ///
    /// Returns `true` if the handle was cancelled before the duration elapsed.
    /// Meant for synchronous background work running on the worker thread.
    pub fn sleep_unless_cancelled(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}
