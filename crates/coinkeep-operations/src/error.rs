//! Error types for operations and their external collaborators.

use coinkeep_task_executor::ExecutorError;

/// Errors raised by this crate's own API.
#[derive(Debug, thiserror::Error)]
pub enum OperationsError {
    #[error("Unknown task id: {0}")]
    UnknownTaskId(i32),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Failure reported by a [`CollectionStore`](crate::CollectionStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database is not open")]
    NotOpen,

    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    InvalidRequest(String),
}

/// Failure reported by a [`CollectionTransfer`](crate::CollectionTransfer).
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    PermissionDenied(String),
}

/// Errors of the legacy three-phase adapter.
#[derive(Debug, thiserror::Error)]
pub enum LegacyTaskError {
    #[error("Legacy task has already been executed")]
    AlreadyStarted,

    #[error("Main loop is gone, legacy task cannot run")]
    MainLoopGone,

    #[error("Failed to spawn legacy worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}
