//! Collection operation flows.
//!
//! Each long-running collection operation checks the database, reports
//! "started" to a [`ProgressListener`], runs its work through an
//! [`OperationController`](crate::OperationController), and reports the
//! completion message plus whether the UI needs a refresh.

pub mod operations;
pub mod traits;

pub use operations::{CollectionOperations, SaveCollectionRequest};
pub use traits::{
    CoinSlot, CollectionInfo, CollectionStore, CollectionTransfer, ExportTarget, ImportSource,
    ProgressListener,
};
