//! External collaborators of the collection flows.
//!
//! Bodies live outside this crate: SQL lives behind [`CollectionStore`],
//! CSV/JSON formats behind [`CollectionTransfer`], widgets behind
//! [`ProgressListener`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, TransferError};

/// Summary of one collection as shown in the collection list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub coin_type: String,
    pub max: u32,
    pub collected: u32,
}

/// A single coin slot of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinSlot {
    pub identifier: String,
    pub mint: String,
    pub collected: bool,
}

/// The shared database adapter.
///
/// Owned by the host; operations hold it only for the duration of one call.
pub trait CollectionStore: Send + Sync {
    /// Open (and upgrade, if needed) the database.
    fn open(&self) -> Result<(), StoreError>;

    fn is_open(&self) -> bool;

    fn close(&self);

    fn create_collection(
        &self,
        info: &CollectionInfo,
        display_order: u32,
        coins: &[CoinSlot],
    ) -> Result<(), StoreError>;

    /// Replace the collection currently named `old_name`.
    fn update_collection(
        &self,
        old_name: &str,
        info: &CollectionInfo,
        coins: &[CoinSlot],
    ) -> Result<(), StoreError>;
}

/// Where an import reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportSource {
    /// Legacy one-file-per-collection CSV export folder
    LegacyCsv { folder: PathBuf },
    SingleCsv { path: PathBuf },
    Json { path: PathBuf },
}

impl ImportSource {
    /// Pick CSV or JSON by the file extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            ImportSource::SingleCsv { path }
        } else {
            ImportSource::Json { path }
        }
    }
}

/// Where an export writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportTarget {
    LegacyCsv { folder: PathBuf },
    SingleCsv { path: PathBuf },
    Json { path: PathBuf },
}

/// Import/export serialization. Returns the message to show the user
/// (`""` when there is nothing to report).
pub trait CollectionTransfer: Send + Sync {
    fn import_collections(
        &self,
        store: &dyn CollectionStore,
        source: &ImportSource,
    ) -> Result<String, TransferError>;

    fn export_collections(
        &self,
        store: &dyn CollectionStore,
        target: &ExportTarget,
    ) -> Result<String, TransferError>;
}

/// Receives progress of a collection operation on the main loop.
pub trait ProgressListener: Send + Sync {
    fn on_task_started(&self, message: &str);

    fn on_task_completed(&self, result: &str, requires_ui_refresh: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_source_from_extension() {
        assert_eq!(
            ImportSource::from_path("/sdcard/backup/coins.CSV"),
            ImportSource::SingleCsv {
                path: PathBuf::from("/sdcard/backup/coins.CSV")
            }
        );
        assert_eq!(
            ImportSource::from_path("coins.json"),
            ImportSource::Json {
                path: PathBuf::from("coins.json")
            }
        );
        assert!(matches!(
            ImportSource::from_path("no_extension"),
            ImportSource::Json { .. }
        ));
    }

    #[test]
    fn test_export_target_serde_tag() {
        let target = ExportTarget::SingleCsv {
            path: PathBuf::from("out.csv"),
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["kind"], "single_csv");
        assert_eq!(json["path"], "out.csv");
    }
}
