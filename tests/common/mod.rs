//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use coinkeep_operations::prelude::*;
use coinkeep_operations::{CoinSlot, CollectionInfo};

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary. Filter with
/// `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Drive `main_loop` until `done` holds, failing the test after five seconds.
pub async fn drive_until(main_loop: &mut MainLoop, mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            if !main_loop.turn().await {
                break;
            }
        }
    })
    .await
    .expect("main loop did not reach the expected state in time");
}

/// Drive `main_loop` for `duration` regardless of what it runs.
pub async fn drive_for(main_loop: &mut MainLoop, duration: Duration) {
    let _ = tokio::time::timeout(duration, async {
        while main_loop.turn().await {}
    })
    .await;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCollection {
    pub info: CollectionInfo,
    pub display_order: u32,
    pub coins: Vec<CoinSlot>,
}

/// `CollectionStore` kept in memory, keyed by collection name.
#[derive(Default)]
pub struct MemoryStore {
    open: AtomicBool,
    closed: AtomicBool,
    collections: Mutex<BTreeMap<String, StoredCollection>>,
}

impl MemoryStore {
    pub fn opened() -> Arc<Self> {
        let store = Self::default();
        store.open.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn names(&self) -> Vec<String> {
        self.collections.lock().unwrap().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<StoredCollection> {
        self.collections.lock().unwrap().values().cloned().collect()
    }

    pub fn insert(&self, collection: StoredCollection) {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.info.name.clone(), collection);
    }
}

impl CollectionStore for MemoryStore {
    fn open(&self) -> Result<(), StoreError> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }

    fn create_collection(
        &self,
        info: &CollectionInfo,
        display_order: u32,
        coins: &[CoinSlot],
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().unwrap();
        if collections.contains_key(&info.name) {
            return Err(StoreError::Database(format!(
                "collection {} already exists",
                info.name
            )));
        }
        collections.insert(
            info.name.clone(),
            StoredCollection {
                info: info.clone(),
                display_order,
                coins: coins.to_vec(),
            },
        );
        Ok(())
    }

    fn update_collection(
        &self,
        old_name: &str,
        info: &CollectionInfo,
        coins: &[CoinSlot],
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().unwrap();
        let previous = collections
            .remove(old_name)
            .ok_or_else(|| StoreError::Database(format!("no collection named {old_name}")))?;
        collections.insert(
            info.name.clone(),
            StoredCollection {
                info: info.clone(),
                display_order: previous.display_order,
                coins: coins.to_vec(),
            },
        );
        Ok(())
    }
}

/// JSON backup format used by [`JsonFileTransfer`].
#[derive(Debug, Serialize, Deserialize)]
struct Backup {
    collections: Vec<StoredCollection>,
}

/// `CollectionTransfer` that understands the JSON targets only.
pub struct JsonFileTransfer {
    store: Arc<MemoryStore>,
}

impl JsonFileTransfer {
    pub fn new(store: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

impl CollectionTransfer for JsonFileTransfer {
    fn import_collections(
        &self,
        _store: &dyn CollectionStore,
        source: &ImportSource,
    ) -> Result<String, TransferError> {
        let ImportSource::Json { path } = source else {
            return Err(TransferError::PermissionDenied(
                "only JSON backups can be read".to_string(),
            ));
        };
        let backup: Backup = serde_json::from_slice(&fs::read(path)?)
            .map_err(|err| TransferError::Io(err.into()))?;
        let count = backup.collections.len();
        for collection in backup.collections {
            self.store.insert(collection);
        }
        Ok(format!("Imported {count} collections"))
    }

    fn export_collections(
        &self,
        _store: &dyn CollectionStore,
        target: &ExportTarget,
    ) -> Result<String, TransferError> {
        let ExportTarget::Json { path } = target else {
            return Err(TransferError::PermissionDenied(
                "only JSON backups can be written".to_string(),
            ));
        };
        let backup = Backup {
            collections: self.store.snapshot(),
        };
        let bytes =
            serde_json::to_vec_pretty(&backup).map_err(|err| TransferError::Io(err.into()))?;
        fs::write(path, bytes)?;
        Ok(String::new())
    }
}

/// `ProgressListener` that records every callback.
#[derive(Default)]
pub struct RecordingProgress {
    pub started: Mutex<Vec<String>>,
    pub completed: Mutex<Vec<(String, bool)>>,
}

impl RecordingProgress {
    pub fn completed(&self) -> Vec<(String, bool)> {
        self.completed.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

impl ProgressListener for RecordingProgress {
    fn on_task_started(&self, message: &str) {
        self.started.lock().unwrap().push(message.to_string());
    }

    fn on_task_completed(&self, result: &str, requires_ui_refresh: bool) {
        self.completed
            .lock()
            .unwrap()
            .push((result.to_string(), requires_ui_refresh));
    }
}

pub fn collection(name: &str, coins: usize) -> StoredCollection {
    StoredCollection {
        info: CollectionInfo {
            name: name.to_string(),
            coin_type: "Jefferson Nickels".to_string(),
            max: coins as u32,
            collected: 0,
        },
        display_order: 0,
        coins: (0..coins)
            .map(|i| CoinSlot {
                identifier: format!("{}", 1938 + i),
                mint: "D".to_string(),
                collected: i % 2 == 0,
            })
            .collect(),
    }
}
