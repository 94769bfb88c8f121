//! Legacy three-phase callback adapter.
//!
//! Drives callers written against the older listener shape
//! (`on_pre_execute` / `do_in_background` / `on_post_execute`) through a
//! dedicated worker thread and the main loop, without migrating them to
//! [`OperationController`](crate::OperationController).
//!
//! The listener may be absent at any point, including mid-execution. Each
//! phase polls for it a bounded number of times and silently drops its
//! callback if it never shows up. This polling is a known race-condition
//! workaround for callers that attach their listener just after
//! construction; it is kept for compatibility only and should be removed once
//! every caller observes an `OperationController` instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, mpsc};
use std::thread;

use tracing::{debug, warn};

use coinkeep_task_executor::MainThreadDispatcher;

use crate::config::LegacyTaskConfig;
use crate::error::LegacyTaskError;

/// The older listener interface.
pub trait AsyncProgressListener: Send + Sync {
    /// Called on the main loop before background work.
    fn on_pre_execute(&self);

    /// Called on the worker thread; returns the result string.
    fn do_in_background(&self) -> String;

    /// Called on the main loop with the background result (`""` if none).
    fn on_post_execute(&self, result: &str);
}

type ListenerSlot = Arc<RwLock<Option<Arc<dyn AsyncProgressListener>>>>;

/// One-shot legacy task.
pub struct LegacyProgressTask {
    task_id: i32,
    listener: ListenerSlot,
    dispatcher: MainThreadDispatcher,
    config: LegacyTaskConfig,
    started: AtomicBool,
}

impl LegacyProgressTask {
    pub fn new(
        task_id: impl Into<i32>,
        listener: Option<Arc<dyn AsyncProgressListener>>,
        dispatcher: MainThreadDispatcher,
    ) -> Self {
        Self::with_config(task_id, listener, dispatcher, LegacyTaskConfig::default())
    }

    pub fn with_config(
        task_id: impl Into<i32>,
        listener: Option<Arc<dyn AsyncProgressListener>>,
        dispatcher: MainThreadDispatcher,
        config: LegacyTaskConfig,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            listener: Arc::new(RwLock::new(listener)),
            dispatcher,
            config,
            started: AtomicBool::new(false),
        }
    }

    pub fn task_id(&self) -> i32 {
        self.task_id
    }

    /// Attach (`Some`) or detach (`None`) the listener.
    pub fn set_listener(&self, listener: Option<Arc<dyn AsyncProgressListener>>) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub fn has_listener(&self) -> bool {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Detach the listener so in-flight phases stop delivering callbacks.
    ///
    /// A worker sleeping inside the listener poll is not woken; it sees no
    /// listener when it wakes and falls through.
    pub fn cancel(&self) {
        self.set_listener(None);
        debug!(task_id = self.task_id, "Legacy task listener detached");
    }

    /// Run pre-work on the main loop, background work on a dedicated worker
    /// thread, then post-work on the main loop. May be called once.
    pub fn execute(&self) -> Result<(), LegacyTaskError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(LegacyTaskError::AlreadyStarted);
        }

        let phases = Phases {
            task_id: self.task_id,
            listener: Arc::clone(&self.listener),
            config: self.config.clone(),
        };
        let (pre_done_tx, pre_done_rx) = mpsc::channel::<()>();

        let worker_phases = phases.clone();
        let dispatcher = self.dispatcher.clone();
        thread::Builder::new()
            .name(format!("coinkeep-legacy-task-{}", self.task_id))
            .spawn(move || {
                // Sender dropped without signalling: the main loop is gone
                if pre_done_rx.recv().is_err() {
                    debug!(task_id = worker_phases.task_id, "Main loop gone before pre-execute ran");
                    return;
                }
                let result = worker_phases
                    .with_listener("do_in_background", |listener| listener.do_in_background())
                    .unwrap_or_default();
                let task_id = worker_phases.task_id;
                let posted = dispatcher.post(move || {
                    worker_phases.with_listener("on_post_execute", |listener| {
                        listener.on_post_execute(&result)
                    });
                });
                if !posted {
                    warn!(task_id, "Main loop is gone, dropping on_post_execute");
                }
            })?;

        let posted = self.dispatcher.post(move || {
            phases.with_listener("on_pre_execute", |listener| listener.on_pre_execute());
            let _ = pre_done_tx.send(());
        });
        if !posted {
            // The worker sees the dropped signal sender and exits
            warn!(task_id = self.task_id, "Main loop is gone, dropping legacy task");
            return Err(LegacyTaskError::MainLoopGone);
        }
        Ok(())
    }
}

impl std::fmt::Debug for LegacyProgressTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyProgressTask")
            .field("task_id", &self.task_id)
            .field("has_listener", &self.has_listener())
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish()
    }
}

#[derive(Clone)]
struct Phases {
    task_id: i32,
    listener: ListenerSlot,
    config: LegacyTaskConfig,
}

impl Phases {
    fn current_listener(&self) -> Option<Arc<dyn AsyncProgressListener>> {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `callback` against the listener, polling for it up to the
    /// configured number of attempts. `None` if it never appeared.
    fn with_listener<R>(
        &self,
        phase: &'static str,
        callback: impl FnOnce(&dyn AsyncProgressListener) -> R,
    ) -> Option<R> {
        for attempt in 1..=self.config.max_listener_attempts {
            if let Some(listener) = self.current_listener() {
                return Some(callback(listener.as_ref()));
            }
            debug!(task_id = self.task_id, phase, attempt, "No listener attached yet");
            thread::sleep(self.config.listener_poll_interval());
        }
        warn!(task_id = self.task_id, phase, "Listener never attached, dropping callback");
        None
    }
}
