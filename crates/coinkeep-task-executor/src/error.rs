//! Error types for the task executor.

use std::any::Any;

/// Boxed error returned by background work.
///
/// `anyhow::Error`, `std::io::Error` and any other `Error + Send + Sync`
/// convert into it with `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Lifecycle and setup errors of the executor itself.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// A task was submitted after [`shutdown`](crate::TaskExecutor::shutdown).
    ///
    /// This is a caller bug: the owner failed to coordinate teardown.
    #[error("Task {task_id} submitted after executor shutdown")]
    ShutDown { task_id: i32 },

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// A background unit of work that failed instead of producing a result.
///
/// Never escapes the worker thread: its `Display` form is delivered as the
/// terminal result string.
#[derive(Debug, thiserror::Error)]
pub enum OperationFailure {
    #[error("Error: {0}")]
    Returned(BoxError),

    #[error("Error: {0}")]
    Panicked(String),
}

impl OperationFailure {
    /// Build a failure from a `catch_unwind` payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "background work panicked".to_string(),
            },
        };
        OperationFailure::Panicked(message)
    }
}
