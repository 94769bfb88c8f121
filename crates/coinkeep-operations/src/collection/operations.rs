//! `CollectionOperations`: the open/import/export/save flows.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use coinkeep_task_executor::{CancellationHandle, TaskDescriptor, WorkResult};

use crate::collection::traits::{
    CoinSlot, CollectionInfo, CollectionStore, CollectionTransfer, ExportTarget, ImportSource,
    ProgressListener,
};
use crate::config::OperationMessages;
use crate::controller::OperationController;
use crate::error::{StoreError, TransferError};
use crate::task_id::TaskId;

/// Create a new collection or update an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SaveCollectionRequest {
    Create {
        info: CollectionInfo,
        coins: Vec<CoinSlot>,
        display_order: u32,
    },
    Update {
        /// Name of the collection being replaced
        existing_name: Option<String>,
        info: CollectionInfo,
        coins: Vec<CoinSlot>,
    },
}

/// Runs collection operations through one [`OperationController`].
///
/// The store is shared with the host and never owned; the only lifecycle
/// action taken on it is closing it at teardown if `open_database` opened it.
pub struct CollectionOperations {
    controller: OperationController,
    store: Arc<dyn CollectionStore>,
    transfer: Arc<dyn CollectionTransfer>,
    messages: Arc<OperationMessages>,
    opened_here: Arc<AtomicBool>,
}

impl CollectionOperations {
    pub fn new(
        controller: OperationController,
        store: Arc<dyn CollectionStore>,
        transfer: Arc<dyn CollectionTransfer>,
    ) -> Self {
        Self {
            controller,
            store,
            transfer,
            messages: Arc::new(OperationMessages::default()),
            opened_here: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_messages(mut self, messages: OperationMessages) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    pub fn controller(&self) -> &OperationController {
        &self.controller
    }

    /// Open (and upgrade) the database. Completes with `""` on success.
    pub fn open_database(&self, listener: Arc<dyn ProgressListener>) {
        let store = Arc::clone(&self.store);
        let messages = Arc::clone(&self.messages);
        let opened_here = Arc::clone(&self.opened_here);

        self.run(
            TaskId::OpenDatabase,
            self.messages.opening_database.clone(),
            true,
            listener,
            move |_| {
                let message = match store.open() {
                    Ok(()) => {
                        opened_here.store(true, Ordering::SeqCst);
                        debug!("Database opened");
                        String::new()
                    }
                    Err(StoreError::Database(detail)) => {
                        warn!(error = %detail, "Error opening database");
                        messages.error_opening_database.clone()
                    }
                    Err(err) => {
                        warn!(error = %err, "Unexpected error opening database");
                        OperationMessages::with_detail(&messages.error_opening_database, err)
                    }
                };
                Ok(message)
            },
        );
    }

    pub fn import_collections(&self, source: ImportSource, listener: Arc<dyn ProgressListener>) {
        if !self.ensure_open(listener.as_ref()) {
            return;
        }
        let store = Arc::clone(&self.store);
        let transfer = Arc::clone(&self.transfer);
        let messages = Arc::clone(&self.messages);

        self.run(
            TaskId::ImportCollections,
            self.messages.importing_collections.clone(),
            true,
            listener,
            move |_| {
                let message = match transfer.import_collections(store.as_ref(), &source) {
                    Ok(message) => message,
                    Err(TransferError::Io(err)) => {
                        warn!(error = %err, "Error importing collections");
                        OperationMessages::with_detail(&messages.error_importing, err)
                    }
                    Err(TransferError::PermissionDenied(detail)) => {
                        warn!(error = %detail, "Permission error importing collections");
                        OperationMessages::with_detail(&messages.error_importing_permission, detail)
                    }
                };
                Ok(message)
            },
        );
    }

    pub fn export_collections(&self, target: ExportTarget, listener: Arc<dyn ProgressListener>) {
        if !self.ensure_open(listener.as_ref()) {
            return;
        }
        let store = Arc::clone(&self.store);
        let transfer = Arc::clone(&self.transfer);
        let messages = Arc::clone(&self.messages);

        self.run(
            TaskId::ExportCollections,
            self.messages.exporting_collections.clone(),
            false,
            listener,
            move |_| {
                let message = match transfer.export_collections(store.as_ref(), &target) {
                    Ok(message) => message,
                    Err(TransferError::Io(err)) => {
                        warn!(error = %err, "Error exporting collections");
                        OperationMessages::with_detail(&messages.error_exporting, err)
                    }
                    Err(TransferError::PermissionDenied(detail)) => {
                        warn!(error = %detail, "Permission error exporting collections");
                        OperationMessages::with_detail(&messages.error_exporting_permission, detail)
                    }
                };
                Ok(message)
            },
        );
    }

    /// Create or update a collection. Completes with `""` on success.
    pub fn save_collection(&self, request: SaveCollectionRequest, listener: Arc<dyn ProgressListener>) {
        if !self.ensure_open(listener.as_ref()) {
            return;
        }
        let store = Arc::clone(&self.store);
        let messages = Arc::clone(&self.messages);

        self.run(
            TaskId::CreateOrUpdateCollection,
            self.messages.creating_collection.clone(),
            false,
            listener,
            move |_| {
                let saved = match &request {
                    SaveCollectionRequest::Create {
                        info,
                        coins,
                        display_order,
                    } => store.create_collection(info, *display_order, coins),
                    SaveCollectionRequest::Update {
                        existing_name: Some(existing_name),
                        info,
                        coins,
                    } => store.update_collection(existing_name, info, coins),
                    SaveCollectionRequest::Update {
                        existing_name: None,
                        ..
                    } => Err(StoreError::InvalidRequest(
                        "Existing collection name is required when updating a collection"
                            .to_string(),
                    )),
                };
                let message = match saved {
                    Ok(()) => String::new(),
                    Err(StoreError::InvalidRequest(message)) => {
                        warn!(error = %message, "Invalid save request");
                        message
                    }
                    Err(err) => {
                        warn!(error = %err, "Error saving collection");
                        messages.error_creating_database.clone()
                    }
                };
                Ok(message)
            },
        );
    }

    /// Permanent teardown: shuts the controller down and closes the store if
    /// this object opened it. Idempotent.
    pub fn shutdown(&self) {
        self.controller.shutdown();
        if self.opened_here.swap(false, Ordering::SeqCst) {
            self.store.close();
            info!("Database closed at teardown");
        }
    }

    fn ensure_open(&self, listener: &dyn ProgressListener) -> bool {
        if self.store.is_open() {
            return true;
        }
        warn!("Collection operation requested while database is not open");
        listener.on_task_completed(&self.messages.error_database_not_open, false);
        false
    }

    /// Submit `work` under `task_id`, reporting start and completion to
    /// `listener`. Completion of a task that is no longer current is dropped.
    fn run<W>(
        &self,
        task_id: TaskId,
        started_message: String,
        requires_ui_refresh: bool,
        listener: Arc<dyn ProgressListener>,
        work: W,
    ) where
        W: FnOnce(&CancellationHandle) -> WorkResult + Send + 'static,
    {
        let started_listener = Arc::clone(&listener);
        let current_task_id = Arc::clone(self.controller.current_task_id());

        let descriptor = TaskDescriptor::new(task_id, work)
            .with_pre_work(move || started_listener.on_task_started(&started_message))
            .with_post_work(move |result| {
                if current_task_id.get() != Some(task_id.as_raw()) {
                    debug!(task = %task_id, "Ignoring result of stale task");
                    return;
                }
                listener.on_task_completed(&result, requires_ui_refresh);
            });
        self.controller.execute(descriptor);
    }
}

impl Drop for CollectionOperations {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CollectionOperations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionOperations")
            .field("controller", &self.controller)
            .field("store_open", &self.store.is_open())
            .field("opened_here", &self.opened_here.load(Ordering::SeqCst))
            .finish()
    }
}
