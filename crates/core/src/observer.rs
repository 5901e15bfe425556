//! Change observers.
//!
//! A plain register/unregister callback registry. Presentation layers hook in
//! here to learn that some part of the store changed and re-read what they
//! need.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// What part of the store changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    /// Cached collections were replaced, edited or purged.
    Cache,
    /// The offline action queue changed.
    Queue,
    /// Snapshots were created, restored or deleted.
    Snapshots,
    /// Resource versions or conflicts changed.
    Versions,
    /// Cart items or cart status changed.
    Cart,
}

/// Handle returned by `Observers::register`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Observers {
    next_id: Arc<AtomicU64>,
    callbacks: Arc<Mutex<Vec<(ObserverId, Callback)>>>,
}

impl core::fmt::Debug for Observers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Observers")
            .field("registered", &self.len())
            .finish()
    }
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub fn len(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, event: ChangeEvent) {
        // Callbacks run outside the lock so they may (un)register observers.
        let callbacks: Vec<Callback> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }
}
