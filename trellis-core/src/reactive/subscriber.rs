//! Subscriber types for the reactive system.
//!
//! A subscriber is either a tracked computation (identified by its
//! [`SubscriberId`] in the dependency store) or a plain callback registered
//! on a signal or model.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Unique identifier for a subscriber.
///
/// Each subscriber (effect, computed, or callback) gets a unique ID when
/// created. This ID is used to track dependencies and avoid duplicate
/// subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

pub(crate) type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An insertion-ordered set of value callbacks.
pub(crate) struct SubscriberSet<T> {
    entries: Mutex<IndexMap<SubscriberId, Callback<T>>>,
}

impl<T> SubscriberSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub(crate) fn insert(&self, callback: Callback<T>) -> SubscriberId {
        let id = SubscriberId::new();
        self.entries.lock().insert(id, callback);
        id
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.entries.lock().shift_remove(&id);
        removed.is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Deliver `value` to every subscriber registered when delivery starts.
    ///
    /// The set is snapshotted first: callbacks may subscribe or unsubscribe
    /// (themselves or others) without affecting this delivery.
    pub(crate) fn notify(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self.entries.lock().values().cloned().collect();
        for callback in snapshot {
            callback(value);
        }
    }
}

/// Handle returned by `subscribe`; removes the callback it was issued for.
///
/// Dropping the handle keeps the subscription alive.
pub struct Subscription {
    id: SubscriberId,
    detach: Arc<dyn Fn(SubscriberId) -> bool + Send + Sync>,
}

impl Subscription {
    pub(crate) fn new<F>(id: SubscriberId, detach: F) -> Self
    where
        F: Fn(SubscriberId) -> bool + Send + Sync + 'static,
    {
        Self {
            id,
            detach: Arc::new(detach),
        }
    }

    /// The subscriber ID this handle removes.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the callback. Returns `false` if it was already removed or its
    /// source no longer exists.
    pub fn unsubscribe(&self) -> bool {
        (self.detach)(self.id)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
