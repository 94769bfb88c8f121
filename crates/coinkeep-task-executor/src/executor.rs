//! Task Executor: runs one background unit of work at a time.
//!
//! Separates *where phases run* from *what they do*:
//! - pre-work and post-work run on the main loop ([`MainThreadDispatcher`])
//! - background work runs on a dedicated single worker thread
//! - in synchronous mode every phase runs inline in the caller's thread
//!
//! Submitting a task while another is pending supersedes it: the older
//! task's cancellation handle is flipped and none of its later callbacks are
//! honored.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationHandle;
use crate::config::ExecutorConfig;
use crate::dispatcher::MainThreadDispatcher;
use crate::error::{BoxError, ExecutorError, OperationFailure};
use crate::observable::{Observable, lock};

/// Result of a background unit of work.
pub type WorkResult = Result<String, BoxError>;

/// Background work: receives the task's cancellation handle and produces the
/// terminal result string.
pub type BackgroundWork = Box<dyn FnOnce(&CancellationHandle) -> WorkResult + Send + 'static>;

/// Work run on the main loop before background work starts.
pub type PreWork = Box<dyn FnOnce() + Send + 'static>;

/// Work run on the main loop with the published terminal result.
pub type PostWork = Box<dyn FnOnce(String) + Send + 'static>;

type WorkerJob = Box<dyn FnOnce() + Send + 'static>;

/// One submitted unit of work. Consumed by [`TaskExecutor::submit`].
pub struct TaskDescriptor {
    id: i32,
    background: BackgroundWork,
    pre: Option<PreWork>,
    post: Option<PostWork>,
}

impl TaskDescriptor {
    pub fn new<F>(id: impl Into<i32>, background: F) -> Self
    where
        F: FnOnce(&CancellationHandle) -> WorkResult + Send + 'static,
    {
        Self {
            id: id.into(),
            background: Box::new(background),
            pre: None,
            post: None,
        }
    }

    pub fn with_pre_work<F>(mut self, pre: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.pre = Some(Box::new(pre));
        self
    }

    pub fn with_post_work<F>(mut self, post: F) -> Self
    where
        F: FnOnce(String) + Send + 'static,
    {
        self.post = Some(Box::new(post));
        self
    }

    pub fn id(&self) -> i32 {
        self.id
    }
}

impl std::fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("id", &self.id)
            .field("has_pre_work", &self.pre.is_some())
            .field("has_post_work", &self.post.is_some())
            .finish()
    }
}

/// The in-flight invocation. At most one exists per executor.
struct PendingHandle {
    sequence: u64,
    task_id: i32,
    cancellation: CancellationHandle,
}

/// State shared with worker jobs and main-loop callbacks.
struct Shared {
    dispatcher: MainThreadDispatcher,
    current: Mutex<Option<PendingHandle>>,
    running: Observable<bool>,
    result: Observable<Option<String>>,
}

impl Shared {
    /// Install `handle` as current, returning the one it replaced.
    fn replace_current(&self, handle: PendingHandle) -> Option<PendingHandle> {
        lock(&self.current).replace(handle)
    }

    fn take_current(&self) -> Option<PendingHandle> {
        lock(&self.current).take()
    }

    /// Clear the pending handle only if it still belongs to `sequence`.
    fn take_if_current(&self, sequence: u64) -> bool {
        let mut current = lock(&self.current);
        match current.as_ref() {
            Some(handle) if handle.sequence == sequence => {
                current.take();
                true
            }
            _ => false,
        }
    }

    /// Retire `sequence` without a result when its callbacks can no longer
    /// reach the main loop.
    fn abandon(&self, sequence: u64, task_id: i32) {
        if self.take_if_current(sequence) {
            self.running.set(false);
        }
        warn!(task_id, sequence, "Main loop is gone, dropping task");
    }

    fn is_current(&self, sequence: u64) -> bool {
        lock(&self.current)
            .as_ref()
            .is_some_and(|handle| handle.sequence == sequence)
    }

    /// Publish the terminal result of `sequence` and run its post-work.
    ///
    /// Results of superseded or cancelled tasks are discarded. The running
    /// flag drops before the result is published, so a result observer may
    /// submit the next task.
    fn complete(&self, sequence: u64, task_id: i32, result: String, post: Option<PostWork>) {
        if !self.take_if_current(sequence) {
            debug!(task_id, sequence, "Discarding result of superseded or cancelled task");
            return;
        }
        self.running.set(false);
        self.result.set(Some(result.clone()));
        debug!(task_id, sequence, "Task completed");
        if let Some(post) = post {
            post(result);
        }
    }
}

struct Worker {
    jobs: mpsc::UnboundedSender<WorkerJob>,
}

impl Worker {
    fn spawn(name: &str) -> Result<Self, ExecutorError> {
        let (jobs, mut rx) = mpsc::unbounded_channel::<WorkerJob>();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                job();
            }
            debug!("Worker thread exiting: job channel closed");
        })?;
        Ok(Self { jobs })
    }
}

/// Single-slot background executor.
///
/// Exposes two observable signals: [`is_running`](Self::is_running) and the
/// terminal [`result`](Self::result). Both are only written from the main
/// loop, or from the caller's thread in synchronous mode.
pub struct TaskExecutor {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    next_sequence: AtomicU64,
    synchronous: AtomicBool,
    shut_down: AtomicBool,
}

impl TaskExecutor {
    /// Create an executor with the default configuration.
    pub fn new(dispatcher: MainThreadDispatcher) -> Result<Self, ExecutorError> {
        Self::with_config(dispatcher, ExecutorConfig::default())
    }

    /// Create an executor, spawning its dedicated worker thread.
    pub fn with_config(
        dispatcher: MainThreadDispatcher,
        config: ExecutorConfig,
    ) -> Result<Self, ExecutorError> {
        let worker = Worker::spawn(&config.worker_thread_name)?;
        debug!(thread = %config.worker_thread_name, synchronous = config.synchronous, "Task executor started");
        Ok(Self {
            shared: Arc::new(Shared {
                dispatcher,
                current: Mutex::new(None),
                running: Observable::new(false),
                result: Observable::new(None),
            }),
            worker: Mutex::new(Some(worker)),
            next_sequence: AtomicU64::new(0),
            synchronous: AtomicBool::new(config.synchronous),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Collapse every asynchronous hop into the caller's thread. Idempotent.
    pub fn set_synchronous_mode(&self, synchronous: bool) {
        self.synchronous.store(synchronous, Ordering::SeqCst);
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous.load(Ordering::SeqCst)
    }

    /// Submit a task, superseding any pending one.
    ///
    /// # Panics
    ///
    /// Panics if called after [`shutdown`](Self::shutdown): that is a
    /// lifecycle bug in the owner, not a recoverable condition.
    pub fn submit(&self, descriptor: TaskDescriptor) {
        if let Err(err) = self.try_submit(descriptor) {
            panic!("{err}");
        }
    }

    /// Submit a task, reporting use-after-shutdown as an error.
    pub fn try_submit(&self, descriptor: TaskDescriptor) -> Result<(), ExecutorError> {
        let TaskDescriptor {
            id: task_id,
            background,
            pre,
            post,
        } = descriptor;

        let jobs = match lock(&self.worker).as_ref() {
            Some(worker) if !self.shut_down.load(Ordering::SeqCst) => worker.jobs.clone(),
            _ => return Err(ExecutorError::ShutDown { task_id }),
        };

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let cancellation = CancellationHandle::new();
        let handle = PendingHandle {
            sequence,
            task_id,
            cancellation: cancellation.clone(),
        };
        if let Some(previous) = self.shared.replace_current(handle) {
            previous.cancellation.cancel();
            debug!(task_id, superseded = previous.task_id, "Superseding pending task");
        }
        self.shared.running.set(true);

        if self.is_synchronous() {
            debug!(task_id, sequence, "Running task inline (synchronous mode)");
            if let Some(pre) = pre {
                pre();
            }
            let result = run_guarded(background, &cancellation);
            self.shared.complete(sequence, task_id, result, post);
            return Ok(());
        }

        debug!(task_id, sequence, "Submitting task");
        let job = background_job(
            Arc::clone(&self.shared),
            sequence,
            task_id,
            cancellation,
            background,
            post,
        );
        match pre {
            // Background work is handed to the worker only after pre-work ran
            Some(pre) => {
                let shared = Arc::clone(&self.shared);
                let posted = self.shared.dispatcher.post(move || {
                    if !shared.is_current(sequence) {
                        debug!(task_id, sequence, "Skipping pre-work of superseded task");
                        return;
                    }
                    pre();
                    enqueue(&jobs, job, task_id);
                });
                if !posted {
                    self.shared.abandon(sequence, task_id);
                }
            }
            None => enqueue(&jobs, job, task_id),
        }
        Ok(())
    }

    /// Cancel the pending task, if any, and drop the running flag at once.
    ///
    /// Only guarantees that no further callbacks of that task are honored;
    /// the worker stops early only if the work polls its handle.
    pub fn cancel(&self) {
        if let Some(handle) = self.shared.take_current() {
            handle.cancellation.cancel();
            self.shared.running.set(false);
            info!(task_id = handle.task_id, sequence = handle.sequence, "Task cancelled");
        }
    }

    /// True iff a pending handle exists and has not completed.
    pub fn is_task_running(&self) -> bool {
        lock(&self.shared.current).is_some()
    }

    /// Cancel any pending task and permanently stop the worker thread.
    ///
    /// Idempotent. The worker finishes the job it is running, if any, and
    /// exits; this call does not wait for it.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel();
        lock(&self.worker).take();
        info!("Task executor shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Running flag signal.
    pub fn is_running(&self) -> &Observable<bool> {
        &self.shared.running
    }

    /// Terminal result signal. `None` until the first task completes.
    pub fn result(&self) -> &Observable<Option<String>> {
        &self.shared.result
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("running", &self.is_task_running())
            .field("synchronous", &self.is_synchronous())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Build the job that runs on the worker thread and hands the result back
/// to the main loop.
fn background_job(
    shared: Arc<Shared>,
    sequence: u64,
    task_id: i32,
    cancellation: CancellationHandle,
    background: BackgroundWork,
    post: Option<PostWork>,
) -> WorkerJob {
    Box::new(move || {
        if cancellation.is_cancelled() {
            debug!(task_id, sequence, "Skipping task cancelled before it started");
            return;
        }
        let result = run_guarded(background, &cancellation);
        let completing = Arc::clone(&shared);
        if !shared
            .dispatcher
            .post(move || completing.complete(sequence, task_id, result, post))
        {
            shared.abandon(sequence, task_id);
        }
    })
}

fn enqueue(jobs: &mpsc::UnboundedSender<WorkerJob>, job: WorkerJob, task_id: i32) {
    if jobs.send(job).is_err() {
        warn!(task_id, "Worker thread is gone, dropping task");
    }
}

/// Run background work, mapping returned errors and panics to the terminal
/// result string. Nothing escapes to terminate the worker thread.
fn run_guarded(background: BackgroundWork, cancellation: &CancellationHandle) -> String {
    match panic::catch_unwind(AssertUnwindSafe(|| background(cancellation))) {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => OperationFailure::Returned(err).to_string(),
        Err(payload) => OperationFailure::from_panic(payload).to_string(),
    }
}
