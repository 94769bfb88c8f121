//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use coinkeep_operations::prelude::*;
//! ```

pub use crate::collection::{
    CollectionOperations, CollectionStore, CollectionTransfer, ExportTarget, ImportSource,
    ProgressListener, SaveCollectionRequest,
};
pub use crate::config::{LegacyTaskConfig, OperationMessages};
pub use crate::controller::{ExecutionState, OperationController};
pub use crate::error::{OperationsError, StoreError, TransferError};
pub use crate::legacy::{AsyncProgressListener, LegacyProgressTask};
pub use crate::task_id::TaskId;

pub use coinkeep_task_executor::prelude::*;
