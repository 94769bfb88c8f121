//! # Observer Detach / Reattach
//!
//! A view observes the controller, goes away while a task is in flight, and
//! a new view attaches afterwards. The task must survive the view and the new
//! view must see the latest state immediately on attach.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use coinkeep_operations::prelude::*;
use common::{drive_until, init_tracing};

#[derive(Default)]
struct View {
    running: Mutex<Vec<bool>>,
    results: Mutex<Vec<String>>,
}

impl View {
    fn attach(self: &Arc<Self>, controller: &OperationController) -> [Observation; 2] {
        let running = Arc::clone(self);
        let results = Arc::clone(self);
        [
            controller
                .is_running()
                .observe(move |value| running.running.lock().unwrap().push(*value)),
            controller.last_result().observe(move |value: &Option<String>| {
                if let Some(value) = value {
                    results.results.lock().unwrap().push(value.clone());
                }
            }),
        ]
    }
}

#[tokio::test]
async fn test_task_outlives_detached_view_and_new_view_sees_result() {
    init_tracing();
    let (dispatcher, mut main_loop) = main_thread();
    let controller = OperationController::new(dispatcher).unwrap();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

    let first_view = Arc::new(View::default());
    let observations = first_view.attach(&controller);
    assert_eq!(*first_view.running.lock().unwrap(), vec![false]);

    controller.execute(TaskDescriptor::new(TaskId::ImportCollections, move |_| {
        release_rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(|err| BoxError::from(err.to_string()))?;
        Ok("Imported 12 collections".to_string())
    }));
    assert_eq!(*first_view.running.lock().unwrap(), vec![false, true]);

    // Surface torn down mid-task
    drop(observations);
    assert_eq!(controller.last_result().observer_count(), 0);
    release_tx.send(()).unwrap();

    drive_until(&mut main_loop, || !controller.is_running().get()).await;
    assert!(first_view.results.lock().unwrap().is_empty());

    let second_view = Arc::new(View::default());
    let _observations = second_view.attach(&controller);
    assert_eq!(*second_view.running.lock().unwrap(), vec![false]);
    assert_eq!(
        *second_view.results.lock().unwrap(),
        vec!["Imported 12 collections"]
    );
}

#[tokio::test]
async fn test_watch_subscriber_sees_terminal_result() {
    let (dispatcher, mut main_loop) = main_thread();
    let controller = OperationController::new(dispatcher).unwrap();
    let mut results = controller.last_result().subscribe();

    controller.execute(TaskDescriptor::new(TaskId::ExportCollections, |_| {
        Ok("Exported 3 collections".to_string())
    }));

    drive_until(&mut main_loop, || !controller.is_currently_running()).await;
    tokio::time::timeout(Duration::from_secs(1), results.changed())
        .await
        .expect("result change not observed")
        .unwrap();
    assert_eq!(
        results.borrow_and_update().as_deref(),
        Some("Exported 3 collections")
    );
}

#[test]
fn test_explicit_detach_stops_delivery() {
    let (dispatcher, _main_loop) = main_thread();
    let controller = OperationController::new(dispatcher).unwrap();
    controller.set_synchronous_mode(true);
    let view = Arc::new(View::default());

    let [running, results] = view.attach(&controller);
    results.detach();
    controller.execute(TaskDescriptor::new(1, |_| Ok("ok".to_string())));
    running.detach();
    controller.execute(TaskDescriptor::new(1, |_| Ok("again".to_string())));

    assert!(view.results.lock().unwrap().is_empty());
    assert_eq!(*view.running.lock().unwrap(), vec![false, true, false]);
    assert_eq!(controller.last_result().get().as_deref(), Some("again"));
}
