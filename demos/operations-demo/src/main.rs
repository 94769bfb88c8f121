//! # Operations Demo
//!
//! Drives the collection flows end to end against an in-memory store:
//! open the database, create collections, export them to a JSON backup,
//! import the backup back, supersede one operation with another, and finish
//! with a legacy three-phase task.
//!
//! ## Usage
//! ```bash
//! RUST_LOG=debug cargo run -p operations-demo -- --collections 3 --delay-ms 200
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use coinkeep_operations::prelude::*;
use coinkeep_operations::{CoinSlot, CollectionInfo};

#[derive(Parser)]
#[command(name = "operations-demo")]
#[command(about = "Run the coin collection operation flows against an in-memory store")]
struct Args {
    /// Number of collections to create before exporting
    #[arg(long, default_value = "3")]
    collections: u32,

    /// Simulated per-collection transfer time in milliseconds
    #[arg(long, default_value = "100")]
    delay_ms: u64,

    /// Backup file written by the export and read by the import
    #[arg(long)]
    backup: Option<PathBuf>,

    /// JSON file overriding the user-facing messages
    #[arg(long)]
    messages: Option<PathBuf>,

    /// Run every phase inline instead of on the worker thread
    #[arg(long)]
    synchronous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCollection {
    info: CollectionInfo,
    display_order: u32,
    coins: Vec<CoinSlot>,
}

#[derive(Default)]
struct InMemoryStore {
    open: AtomicBool,
    collections: Mutex<BTreeMap<String, StoredCollection>>,
}

impl InMemoryStore {
    fn collections(&self) -> Vec<StoredCollection> {
        self.collections
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn replace_all(&self, collections: Vec<StoredCollection>) {
        let mut stored = self
            .collections
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        stored.clear();
        for collection in collections {
            stored.insert(collection.info.name.clone(), collection);
        }
    }
}

impl CollectionStore for InMemoryStore {
    fn open(&self) -> Result<(), StoreError> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn create_collection(
        &self,
        info: &CollectionInfo,
        display_order: u32,
        coins: &[CoinSlot],
    ) -> Result<(), StoreError> {
        let mut stored = self
            .collections
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if stored.contains_key(&info.name) {
            return Err(StoreError::Database(format!("{} already exists", info.name)));
        }
        stored.insert(
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
        let mut stored = self
            .collections
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = stored
            .remove(old_name)
            .ok_or_else(|| StoreError::Database(format!("{old_name} does not exist")))?;
        stored.insert(
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

/// Reads and writes JSON backups, pausing per collection to simulate a slow
/// device.
struct SlowJsonTransfer {
    store: Arc<InMemoryStore>,
    delay: Duration,
}

impl CollectionTransfer for SlowJsonTransfer {
    fn import_collections(
        &self,
        _store: &dyn CollectionStore,
        source: &ImportSource,
    ) -> Result<String, TransferError> {
        let ImportSource::Json { path } = source else {
            return Err(TransferError::PermissionDenied(
                "the demo only reads JSON backups".to_string(),
            ));
        };
        let collections: Vec<StoredCollection> = serde_json::from_slice(&std::fs::read(path)?)
            .map_err(|err| TransferError::Io(err.into()))?;
        for _ in &collections {
            std::thread::sleep(self.delay);
        }
        let count = collections.len();
        self.store.replace_all(collections);
        Ok(format!("Imported {count} collections"))
    }

    fn export_collections(
        &self,
        _store: &dyn CollectionStore,
        target: &ExportTarget,
    ) -> Result<String, TransferError> {
        let ExportTarget::Json { path } = target else {
            return Err(TransferError::PermissionDenied(
                "the demo only writes JSON backups".to_string(),
            ));
        };
        let collections = self.store.collections();
        for _ in &collections {
            std::thread::sleep(self.delay);
        }
        let bytes =
            serde_json::to_vec_pretty(&collections).map_err(|err| TransferError::Io(err.into()))?;
        std::fs::write(path, bytes)?;
        Ok(format!("Exported {} collections", collections.len()))
    }
}

/// Prints progress and forwards completions to the demo driver.
struct ConsoleProgress {
    completions: mpsc::UnboundedSender<String>,
}

impl ProgressListener for ConsoleProgress {
    fn on_task_started(&self, message: &str) {
        println!("  ... {message}");
    }

    fn on_task_completed(&self, result: &str, requires_ui_refresh: bool) {
        let shown = if result.is_empty() { "done" } else { result };
        println!("  <- {shown} (refresh: {requires_ui_refresh})");
        let _ = self.completions.send(result.to_string());
    }
}

struct LegacyCountdown;

impl AsyncProgressListener for LegacyCountdown {
    fn on_pre_execute(&self) {
        println!("  legacy: pre-execute");
    }

    fn do_in_background(&self) -> String {
        std::thread::sleep(Duration::from_millis(50));
        "legacy background finished".to_string()
    }

    fn on_post_execute(&self, result: &str) {
        println!("  legacy: post-execute with '{result}'");
    }
}

fn sample_collection(index: u32) -> (CollectionInfo, Vec<CoinSlot>) {
    let coins: Vec<CoinSlot> = (0..5)
        .map(|year| CoinSlot {
            identifier: format!("{}", 1946 + year),
            mint: if year % 2 == 0 { "P" } else { "D" }.to_string(),
            collected: year < index,
        })
        .collect();
    let info = CollectionInfo {
        name: format!("Roosevelt Dimes #{}", index + 1),
        coin_type: "Roosevelt Dimes".to_string(),
        max: coins.len() as u32,
        collected: coins.iter().filter(|coin| coin.collected).count() as u32,
    };
    (info, coins)
}

/// Turns the main loop on this task until the next completion arrives, so
/// every observer and progress callback runs here.
async fn next_completion(
    main_loop: &mut MainLoop,
    completions: &mut mpsc::UnboundedReceiver<String>,
) -> anyhow::Result<String> {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            if let Ok(result) = completions.try_recv() {
                return Ok(result);
            }
            if !main_loop.turn().await {
                anyhow::bail!("main loop stopped before the operation completed");
            }
        }
    })
    .await
    .context("operation did not complete in time")?
}

/// Turns the main loop on this task for `duration`.
async fn drive_for(main_loop: &mut MainLoop, duration: Duration) {
    let _ = tokio::time::timeout(duration, async {
        while main_loop.turn().await {}
    })
    .await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let backup = args
        .backup
        .unwrap_or_else(|| std::env::temp_dir().join("coinkeep-demo-backup.json"));
    let messages = match &args.messages {
        Some(path) => serde_json::from_slice(
            &std::fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        )
        .context("parsing message overrides")?,
        None => OperationMessages::default(),
    };

    let (dispatcher, mut main_loop) = main_thread();

    let controller = OperationController::new(dispatcher.clone())?;
    controller.set_synchronous_mode(args.synchronous);
    let _running_log = controller.is_running().observe(|running| {
        info!(running = *running, "Operation running state changed");
    });

    let store = Arc::new(InMemoryStore::default());
    let transfer = Arc::new(SlowJsonTransfer {
        store: Arc::clone(&store),
        delay: Duration::from_millis(args.delay_ms),
    });
    let operations =
        CollectionOperations::new(controller, store.clone(), transfer).with_messages(messages);

    let (tx, mut completions) = mpsc::unbounded_channel();
    let progress: Arc<dyn ProgressListener> = Arc::new(ConsoleProgress { completions: tx });

    println!("Opening database");
    operations.open_database(Arc::clone(&progress));
    next_completion(&mut main_loop, &mut completions).await?;

    println!("Creating {} collections", args.collections);
    for index in 0..args.collections {
        let (info, coins) = sample_collection(index);
        operations.save_collection(
            SaveCollectionRequest::Create {
                info,
                coins,
                display_order: index,
            },
            Arc::clone(&progress),
        );
        next_completion(&mut main_loop, &mut completions).await?;
    }

    println!("Exporting to {}", backup.display());
    operations.export_collections(
        ExportTarget::Json {
            path: backup.clone(),
        },
        Arc::clone(&progress),
    );
    next_completion(&mut main_loop, &mut completions).await?;

    println!("Importing from {}", backup.display());
    operations.import_collections(ImportSource::from_path(&backup), Arc::clone(&progress));
    next_completion(&mut main_loop, &mut completions).await?;

    println!("Starting an export and superseding it with a rename");
    operations.export_collections(
        ExportTarget::Json {
            path: backup.clone(),
        },
        Arc::clone(&progress),
    );
    let (info, coins) = sample_collection(0);
    operations.save_collection(
        SaveCollectionRequest::Update {
            existing_name: Some(info.name.clone()),
            info: CollectionInfo {
                name: "Roosevelt Dimes (renamed)".to_string(),
                ..info
            },
            coins,
        },
        Arc::clone(&progress),
    );
    next_completion(&mut main_loop, &mut completions).await?;

    println!("Running a legacy three-phase task");
    let legacy = LegacyProgressTask::with_config(
        TaskId::ExportCollections,
        Some(Arc::new(LegacyCountdown) as Arc<dyn AsyncProgressListener>),
        dispatcher.clone(),
        LegacyTaskConfig::default().with_listener_poll_interval(Duration::from_millis(50)),
    );
    legacy.execute()?;
    drive_for(&mut main_loop, Duration::from_millis(300)).await;

    let state = operations.controller().state();
    println!("Final state: {}", serde_json::to_string(&state)?);
    for collection in store.collections() {
        println!(
            "  {} ({}/{} collected)",
            collection.info.name, collection.info.collected, collection.info.max
        );
    }

    operations.shutdown();
    drop(operations);
    drop(legacy);
    drop(dispatcher);
    main_loop.run_pending();
    Ok(())
}
