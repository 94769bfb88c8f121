//! # Single-slot Task Executor
//!
//! Runs long-lived background operations (database open/upgrade, bulk
//! import/export, collection saves) one at a time, off the main thread,
//! while pre-work and post-work stay on a host-driven main loop.
//!
//! ## Quick Start
//!
//! ```rust
//! use coinkeep_task_executor::prelude::*;
//!
//! # fn example() -> Result<(), ExecutorError> {
//! let (dispatcher, mut main_loop) = main_thread();
//! let executor = TaskExecutor::new(dispatcher)?;
//!
//! executor.submit(
//!     TaskDescriptor::new(1, |_cancel| Ok("imported 3 collections".to_string()))
//!         .with_post_work(|result| println!("{result}")),
//! );
//!
//! // The host drives the main loop; post-work runs inside it.
//! # while executor.is_task_running() { main_loop.run_pending(); std::thread::yield_now(); }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`TaskExecutor`**: at most one pending task; supersede on submit
//! - **`MainThreadDispatcher` / `MainLoop`**: FIFO main-thread context
//! - **`CancellationHandle`**: advisory cancellation passed to background work
//! - **`Observable`**: level-triggered signals (running flag, terminal result)

pub mod cancellation;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod observable;
pub mod prelude;

pub use cancellation::CancellationHandle;
pub use config::ExecutorConfig;
pub use dispatcher::{MainLoop, MainThreadDispatcher, MainThreadJob, main_thread};
pub use error::{BoxError, ExecutorError, OperationFailure};
pub use executor::{BackgroundWork, PostWork, PreWork, TaskDescriptor, TaskExecutor, WorkResult};
pub use observable::{Observable, Observation};
