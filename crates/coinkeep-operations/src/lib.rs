//! # Coinkeep Operations
//!
//! Surface-independent orchestration of long-running collection work on top
//! of [`coinkeep_task_executor`].
//!
//! ## Quick Start
//!
//! ```rust
//! use coinkeep_operations::prelude::*;
//!
//! # fn example() -> Result<(), OperationsError> {
//! let (dispatcher, _main_loop) = main_thread();
//! let controller = OperationController::new(dispatcher)?;
//! controller.set_synchronous_mode(true);
//!
//! let _observer = controller.last_result().observe(|result| {
//!     if let Some(result) = result {
//!         println!("finished: {result}");
//!     }
//! });
//!
//! controller.execute(TaskDescriptor::new(TaskId::ExportCollections, |_cancel| {
//!     Ok(String::new())
//! }));
//! assert_eq!(controller.last_result().get(), Some(String::new()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`OperationController`**: owns the executor, tracks the current task id
//!   and republishes running/result signals that views observe and re-observe
//! - **`LegacyProgressTask`**: adapter for the older three-phase listener shape
//! - **`CollectionOperations`**: open, import, export and save flows reported
//!   through a `ProgressListener`

pub mod collection;
pub mod config;
pub mod controller;
pub mod error;
pub mod legacy;
pub mod prelude;
pub mod state_machine;
pub mod task_id;

pub use collection::{
    CoinSlot, CollectionInfo, CollectionOperations, CollectionStore, CollectionTransfer,
    ExportTarget, ImportSource, ProgressListener, SaveCollectionRequest,
};
pub use config::{LegacyTaskConfig, OperationMessages};
pub use controller::{ExecutionState, OperationController};
pub use error::{LegacyTaskError, OperationsError, StoreError, TransferError};
pub use legacy::{AsyncProgressListener, LegacyProgressTask};
pub use state_machine::ControllerPhase;
pub use task_id::TaskId;
