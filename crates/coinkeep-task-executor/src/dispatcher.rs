//! Main-thread dispatcher: the single execution context for UI-affine work.
//!
//! Pre-work, post-work and observer notification all run inside the
//! [`MainLoop`], which the host drives (from its UI event loop, a dedicated
//! tokio task, or explicitly in tests). Jobs run in FIFO order.

use tokio::sync::mpsc;
use tracing::debug;

/// A unit of work queued for the main loop.
pub type MainThreadJob = Box<dyn FnOnce() + Send + 'static>;

/// Create a connected dispatcher / main loop pair.
pub fn main_thread() -> (MainThreadDispatcher, MainLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MainThreadDispatcher { tx }, MainLoop { rx })
}

/// Cloneable sending side: enqueue work onto the main loop.
#[derive(Clone, Debug)]
pub struct MainThreadDispatcher {
    tx: mpsc::UnboundedSender<MainThreadJob>,
}

impl MainThreadDispatcher {
    /// Enqueue `job` on the main loop.
    ///
    /// Returns `false` (and drops the job) when the main loop no longer
    /// exists, so callbacks never reach a surface that has been torn down.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            debug!("Main loop is gone, dropping posted job");
            return false;
        }
        true
    }

    /// Whether the main loop is still alive.
    pub fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Receiving side, owned by whatever plays the role of the main thread.
#[derive(Debug)]
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<MainThreadJob>,
}

impl MainLoop {
    /// Run every job that is already queued, including jobs those jobs post.
    ///
    /// Never blocks. Returns the number of jobs executed.
    pub fn run_pending(&mut self) -> usize {
        let mut executed = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            executed += 1;
        }
        executed
    }

    /// Wait for the next job and run it.
    ///
    /// Returns `false` once every dispatcher has been dropped and the queue
    /// is empty.
    pub async fn turn(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until every dispatcher has been dropped.
    pub async fn run(mut self) {
        while self.turn().await {}
        debug!("Main loop finished: all dispatchers dropped");
    }
}
