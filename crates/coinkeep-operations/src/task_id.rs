//! Stable task identifiers.
//!
//! The raw values are a caller-facing contract and must never change.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::OperationsError;

/// Kinds of long-running operation the application runs in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum TaskId {
    OpenDatabase = 0,
    ImportCollections = 1,
    CreateOrUpdateCollection = 2,
    ExportCollections = 3,
}

impl TaskId {
    pub const ALL: [TaskId; 4] = [
        TaskId::OpenDatabase,
        TaskId::ImportCollections,
        TaskId::CreateOrUpdateCollection,
        TaskId::ExportCollections,
    ];

    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

impl From<TaskId> for i32 {
    fn from(id: TaskId) -> Self {
        id.as_raw()
    }
}

impl TryFrom<i32> for TaskId {
    type Error = OperationsError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        TaskId::ALL
            .into_iter()
            .find(|id| id.as_raw() == raw)
            .ok_or(OperationsError::UnknownTaskId(raw))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskId::OpenDatabase => "open_database",
            TaskId::ImportCollections => "import_collections",
            TaskId::CreateOrUpdateCollection => "create_or_update_collection",
            TaskId::ExportCollections => "export_collections",
        };
        f.write_str(name)
    }
}
