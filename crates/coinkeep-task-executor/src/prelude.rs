//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use coinkeep_task_executor::prelude::*;
//! ```

pub use crate::cancellation::CancellationHandle;
pub use crate::config::ExecutorConfig;
pub use crate::dispatcher::{MainLoop, MainThreadDispatcher, main_thread};
pub use crate::error::{BoxError, ExecutorError};
pub use crate::executor::{TaskDescriptor, TaskExecutor, WorkResult};
pub use crate::observable::{Observable, Observation};
