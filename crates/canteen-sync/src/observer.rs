//! Typed observer list
//!
//! [`Subject`] fans a value out to registered callbacks and to any number of
//! broadcast receivers. Callbacks run synchronously on the notifying task, so
//! they should be quick.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::broadcast;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned when registering a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Callback list plus broadcast channel for values of type `T`
pub struct Subject<T> {
    observers: RwLock<Vec<(ObserverId, Callback<T>)>>,
    next_id: AtomicU64,
    channel: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Subject<T> {
    pub fn new(capacity: usize) -> Self {
        let (channel, _) = broadcast::channel(capacity.max(1));
        Self {
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            channel,
        }
    }

    /// Register a callback invoked on every notification
    pub fn subscribe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback; returns whether it was registered
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(observer, _)| *observer != id);
        observers.len() != before
    }

    /// A receiver for every subsequent notification
    pub fn receiver(&self) -> broadcast::Receiver<T> {
        self.channel.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Deliver `value` to every callback, then to every receiver
    pub fn notify(&self, value: &T) {
        // Snapshot so callbacks may (un)subscribe without deadlocking
        let callbacks: Vec<Callback<T>> = self
            .observers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(value);
        }
        // No receivers is fine
        let _ = self.channel.send(value.clone());
    }
}
