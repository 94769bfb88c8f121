//! Configuration for the legacy adapter and the collection operation flows.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded listener-attachment retry of the legacy three-phase adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyTaskConfig {
    /// How many times each phase looks for a listener before giving up
    pub max_listener_attempts: u32,
    /// Pause between two looks (milliseconds)
    pub listener_poll_interval_ms: u64,
}

impl Default for LegacyTaskConfig {
    fn default() -> Self {
        Self {
            max_listener_attempts: 10,
            listener_poll_interval_ms: 500,
        }
    }
}

impl LegacyTaskConfig {
    pub fn with_max_listener_attempts(mut self, attempts: u32) -> Self {
        self.max_listener_attempts = attempts;
        self
    }

    pub fn with_listener_poll_interval(mut self, interval: Duration) -> Self {
        self.listener_poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn listener_poll_interval(&self) -> Duration {
        Duration::from_millis(self.listener_poll_interval_ms)
    }
}

/// User-facing messages reported by the collection operation flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationMessages {
    pub opening_database: String,
    pub importing_collections: String,
    pub exporting_collections: String,
    pub creating_collection: String,
    pub error_opening_database: String,
    pub error_database_not_open: String,
    pub error_creating_database: String,
    /// Prefix for import I/O failures, followed by the failure detail
    pub error_importing: String,
    pub error_importing_permission: String,
    /// Prefix for export I/O failures, followed by the failure detail
    pub error_exporting: String,
    pub error_exporting_permission: String,
}

impl Default for OperationMessages {
    fn default() -> Self {
        Self {
            opening_database: "Opening database...".to_string(),
            importing_collections: "Importing collections...".to_string(),
            exporting_collections: "Exporting collections...".to_string(),
            creating_collection: "Creating collection...".to_string(),
            error_opening_database: "Error opening database".to_string(),
            error_database_not_open: "Database is not open".to_string(),
            error_creating_database: "Error creating collection in database".to_string(),
            error_importing: "Error importing".to_string(),
            error_importing_permission: "Permission denied while importing".to_string(),
            error_exporting: "Error exporting".to_string(),
            error_exporting_permission: "Permission denied while exporting".to_string(),
        }
    }
}

impl OperationMessages {
    /// `"<prefix>: <detail>"`
    pub(crate) fn with_detail(prefix: &str, detail: impl std::fmt::Display) -> String {
        format!("{prefix}: {detail}")
    }
}
