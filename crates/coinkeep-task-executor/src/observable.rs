//! Observable signals with level-triggered observation.
//!
//! A long-lived owner holds an [`Observable`]; short-lived surfaces attach
//! with [`Observable::observe`] and detach by dropping the returned
//! [`Observation`]. A newly attached observer immediately receives the
//! current value, so anything that changed while no surface was attached is
//! delivered on reattach.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

type ObserverFn<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;
type ObserverList<T> = Mutex<Vec<(u64, ObserverFn<T>)>>;

/// A value that notifies attached observers whenever it is set.
///
/// Observers run synchronously in the thread calling [`set`](Self::set).
/// Owners only call `set` from the main loop (or from the caller's thread in
/// synchronous mode), which keeps notification main-thread affine.
pub struct Observable<T> {
    value: watch::Sender<T>,
    observers: Arc<ObserverList<T>>,
    next_id: AtomicU64,
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (value, _) = watch::channel(initial);
        Self {
            value,
            observers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Replace the value and notify every attached observer.
    ///
    /// Observers are notified even when the new value equals the old one.
    pub fn set(&self, value: T) {
        self.value.send_replace(value.clone());
        // Snapshot so observers may attach or detach from inside a callback
        let observers: Vec<ObserverFn<T>> = lock(&self.observers)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(&value);
        }
    }

    /// Attach an observer. It is called right away with the current value.
    pub fn observe<F>(&self, observer: F) -> Observation
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let observer: ObserverFn<T> = Arc::new(observer);
        lock(&self.observers).push((id, Arc::clone(&observer)));
        observer(&self.get());

        let observers: Weak<ObserverList<T>> = Arc::downgrade(&self.observers);
        Observation {
            detach: Some(Box::new(move || {
                if let Some(observers) = observers.upgrade() {
                    lock(&observers).retain(|(existing, _)| *existing != id);
                }
            })),
        }
    }

    /// Receiver for async consumers; `borrow()` yields the current value.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.value.subscribe()
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }
}

impl<T> fmt::Debug for Observable<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.value.borrow())
            .finish_non_exhaustive()
    }
}

/// Registration returned by [`Observable::observe`]; dropping it detaches.
///
/// Detaching never fails, including after the observable itself is gone.
#[must_use = "dropping an Observation detaches the observer immediately"]
pub struct Observation {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Observation {
    /// Detach explicitly. Same as dropping.
    pub fn detach(mut self) {
        self.run_detach();
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        self.run_detach();
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
