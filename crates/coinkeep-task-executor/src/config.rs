//! Executor configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`TaskExecutor`](crate::TaskExecutor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Name given to the dedicated worker thread
    pub worker_thread_name: String,
    /// Run every phase inline in the caller's thread (deterministic tests)
    pub synchronous: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_thread_name: "coinkeep-task-worker".to_string(),
            synchronous: false,
        }
    }
}

impl ExecutorConfig {
    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    pub fn with_synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }
}
