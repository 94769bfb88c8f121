//! Operation Controller: surface-lifetime-independent owner of the executor.
//!
//! `OperationController` owns one [`TaskExecutor`], assigns the current task
//! id, and republishes the executor's signals as its own observable state.
//! Views attach and detach observers as they come and go; the controller and
//! the in-flight task outlive them. The host creates the controller on first
//! need and calls [`shutdown`](OperationController::shutdown) (or drops it)
//! only when the surface is gone for good.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use coinkeep_task_executor::{
    ExecutorConfig, ExecutorError, MainThreadDispatcher, Observable, Observation, TaskDescriptor,
    TaskExecutor,
};

use crate::state_machine::ControllerPhase;
use crate::task_id::TaskId;

/// Read-only snapshot of the controller's execution state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionState {
    pub is_running: bool,
    pub last_result: Option<String>,
    pub current_task_id: Option<i32>,
}

/// Owns the task executor and the observable execution state.
pub struct OperationController {
    executor: TaskExecutor,
    is_running: Arc<Observable<bool>>,
    last_result: Arc<Observable<Option<String>>>,
    current_task_id: Arc<Observable<Option<i32>>>,
    /// Keeps the executor -> controller forwarding attached
    _forwarders: [Observation; 2],
    torn_down: AtomicBool,
}

impl OperationController {
    /// Create a controller with the default executor configuration.
    pub fn new(dispatcher: MainThreadDispatcher) -> Result<Self, ExecutorError> {
        Self::with_config(dispatcher, ExecutorConfig::default())
    }

    /// Create a controller whose executor uses `config`.
    pub fn with_config(
        dispatcher: MainThreadDispatcher,
        config: ExecutorConfig,
    ) -> Result<Self, ExecutorError> {
        let executor = TaskExecutor::with_config(dispatcher, config)?;

        let is_running = Arc::new(Observable::new(false));
        let last_result = Arc::new(Observable::new(None));
        let current_task_id = Arc::new(Observable::new(None));

        let running_target = Arc::clone(&is_running);
        let result_target = Arc::clone(&last_result);
        let forwarders = [
            executor
                .is_running()
                .observe(move |running| running_target.set(*running)),
            executor.result().observe(move |result: &Option<String>| {
                // The executor's initial "no result yet" is not a terminal result
                if result.is_some() {
                    result_target.set(result.clone());
                }
            }),
        ];

        Ok(Self {
            executor,
            is_running,
            last_result,
            current_task_id,
            _forwarders: forwarders,
            torn_down: AtomicBool::new(false),
        })
    }

    /// Record `descriptor`'s id as current and submit it, superseding any
    /// running task.
    ///
    /// # Panics
    ///
    /// Panics after [`shutdown`](Self::shutdown).
    pub fn execute(&self, descriptor: TaskDescriptor) {
        if let Err(err) = self.try_execute(descriptor) {
            panic!("{err}");
        }
    }

    /// Same as [`execute`](Self::execute), reporting use-after-shutdown as
    /// an error instead of panicking.
    pub fn try_execute(&self, descriptor: TaskDescriptor) -> Result<(), ExecutorError> {
        let task_id = descriptor.id();
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(ExecutorError::ShutDown { task_id });
        }
        debug!(task_id, task = ?TaskId::try_from(task_id).ok(), "Executing operation");
        self.current_task_id.set(Some(task_id));
        self.executor.try_submit(descriptor)
    }

    /// Propagated to the executor. Idempotent; set it before the first
    /// `execute` in tests.
    pub fn set_synchronous_mode(&self, synchronous: bool) {
        self.executor.set_synchronous_mode(synchronous);
    }

    /// Cancel the running operation, if any, and clear the current task id.
    pub fn cancel_current_operation(&self) {
        self.executor.cancel();
        self.current_task_id.set(None);
    }

    pub fn is_currently_running(&self) -> bool {
        self.executor.is_task_running()
    }

    /// Whether `task_id` is still the current task.
    ///
    /// Post-work that may arrive after a cancel or supersede checks this
    /// before acting on its result.
    pub fn is_current(&self, task_id: impl Into<i32>) -> bool {
        self.current_task_id.get() == Some(task_id.into())
    }

    /// The current task id as a known [`TaskId`], if it is one.
    pub fn current_task(&self) -> Option<TaskId> {
        self.current_task_id
            .get()
            .and_then(|raw| TaskId::try_from(raw).ok())
    }

    pub fn is_running(&self) -> &Arc<Observable<bool>> {
        &self.is_running
    }

    pub fn last_result(&self) -> &Arc<Observable<Option<String>>> {
        &self.last_result
    }

    pub fn current_task_id(&self) -> &Arc<Observable<Option<i32>>> {
        &self.current_task_id
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> ExecutionState {
        ExecutionState {
            is_running: self.is_running.get(),
            last_result: self.last_result.get(),
            current_task_id: self.current_task_id.get(),
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        if self.torn_down.load(Ordering::SeqCst) {
            ControllerPhase::Shutdown
        } else if self.executor.is_task_running() {
            ControllerPhase::Running
        } else {
            ControllerPhase::Idle
        }
    }

    /// Permanent teardown: shuts the executor down exactly once.
    ///
    /// Not to be called on a transient surface recreation; views just drop
    /// their observations then.
    pub fn shutdown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.executor.shutdown();
        info!("Operation controller torn down");
    }
}

impl Drop for OperationController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for OperationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationController")
            .field("phase", &self.phase())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinkeep_task_executor::{MainLoop, main_thread};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    fn controller() -> (OperationController, MainLoop) {
        let (dispatcher, main_loop) = main_thread();
        (OperationController::new(dispatcher).unwrap(), main_loop)
    }

    fn pump_until(main_loop: &mut MainLoop, done: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out pumping main loop");
            if main_loop.run_pending() == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    #[test]
    fn test_initial_state() {
        let (controller, _main_loop) = controller();
        assert_eq!(controller.state(), ExecutionState::default());
        assert_eq!(controller.phase(), ControllerPhase::Idle);
        assert!(!controller.is_currently_running());
    }

    #[test]
    fn test_synchronous_execute_completes_before_return() {
        let (controller, _main_loop) = controller();
        controller.set_synchronous_mode(true);
        controller.set_synchronous_mode(true);
        let capture = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&capture);
        controller.execute(
            TaskDescriptor::new(TaskId::ImportCollections, |_| Ok("ok".to_string()))
                .with_post_work(move |result| *sink.lock().unwrap() = Some(result)),
        );

        assert_eq!(capture.lock().unwrap().as_deref(), Some("ok"));
        assert_eq!(
            controller.state(),
            ExecutionState {
                is_running: false,
                last_result: Some("ok".to_string()),
                current_task_id: Some(1),
            }
        );
        assert_eq!(controller.current_task(), Some(TaskId::ImportCollections));
    }

    #[test]
    fn test_running_signal_forwarded_through_task_lifecycle() {
        let (controller, mut main_loop) = controller();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _observation = controller
            .is_running()
            .observe(move |running| sink.lock().unwrap().push(*running));

        controller.execute(TaskDescriptor::new(TaskId::OpenDatabase, |_| Ok(String::new())));
        assert_eq!(controller.phase(), ControllerPhase::Running);

        pump_until(&mut main_loop, || !controller.is_currently_running());
        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
        assert_eq!(controller.phase(), ControllerPhase::Idle);
        assert_eq!(controller.last_result().get(), Some(String::new()));
    }

    #[test]
    fn test_result_changed_while_detached_delivered_on_reattach() {
        let (controller, mut main_loop) = controller();
        let observation = controller.last_result().observe(|_| {});
        drop(observation);

        controller.execute(TaskDescriptor::new(TaskId::ExportCollections, |_| {
            Ok("exported".to_string())
        }));
        pump_until(&mut main_loop, || !controller.is_currently_running());

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let _observation = controller
            .last_result()
            .observe(move |result| sink.lock().unwrap().push(result.clone()));
        assert_eq!(*delivered.lock().unwrap(), vec![Some("exported".to_string())]);
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let (controller, _main_loop) = controller();
        controller.cancel_current_operation();
        controller.cancel_current_operation();
        assert!(!controller.is_running().get());
        assert_eq!(controller.current_task_id().get(), None);
    }

    #[test]
    fn test_cancel_clears_task_id_and_running() {
        let (controller, _main_loop) = controller();
        controller.execute(TaskDescriptor::new(TaskId::ImportCollections, |cancel| {
            cancel.sleep_unless_cancelled(Duration::from_secs(10));
            Ok(String::new())
        }));
        assert!(controller.is_current(TaskId::ImportCollections));

        controller.cancel_current_operation();
        assert!(!controller.is_running().get());
        assert!(!controller.is_currently_running());
        assert_eq!(controller.current_task_id().get(), None);
        assert!(!controller.is_current(TaskId::ImportCollections));
    }

    #[test]
    fn test_supersede_keeps_running_and_moves_task_id() {
        let (controller, mut main_loop) = controller();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let first_sink = Arc::clone(&first);
        controller.execute(
            TaskDescriptor::new(TaskId::ImportCollections, |cancel| {
                cancel.sleep_unless_cancelled(Duration::from_secs(10));
                Ok("slow".to_string())
            })
            .with_post_work(move |result| first_sink.lock().unwrap().push(result)),
        );
        let second_sink = Arc::clone(&second);
        controller.execute(
            TaskDescriptor::new(TaskId::ExportCollections, |_| Ok("fast".to_string()))
                .with_post_work(move |result| second_sink.lock().unwrap().push(result)),
        );
        assert!(controller.is_currently_running());
        assert!(controller.is_current(TaskId::ExportCollections));

        pump_until(&mut main_loop, || !second.lock().unwrap().is_empty());
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(controller.last_result().get(), Some("fast".to_string()));
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let (controller, _main_loop) = controller();
        controller.shutdown();
        controller.shutdown();
        assert_eq!(controller.phase(), ControllerPhase::Shutdown);
        assert!(!controller.is_currently_running());

        let err = controller
            .try_execute(TaskDescriptor::new(TaskId::OpenDatabase, |_| Ok(String::new())))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::ShutDown { task_id: 0 }));
    }

    #[test]
    #[should_panic(expected = "submitted after executor shutdown")]
    fn test_execute_after_shutdown_panics() {
        let (controller, _main_loop) = controller();
        controller.shutdown();
        controller.execute(TaskDescriptor::new(TaskId::OpenDatabase, |_| Ok(String::new())));
    }
}
