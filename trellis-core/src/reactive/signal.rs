//! Signal Implementation
//!
//! A Signal is the minimal observable: a single value plus a list of
//! callbacks. Unlike the proxy layer it does no dependency tracking; reads
//! inside an effect register nothing. Subscribers are pushed the new value
//! when it changes.
//!
//! # How Signals Work
//!
//! 1. `get()` clones the current value out.
//!
//! 2. `set(v)` compares `v` with the current value. Equal values are a
//!    no-op; otherwise the value is replaced and every subscriber is called
//!    with it, synchronously, before `set` returns.
//!
//! 3. `subscribe(f)` returns a [`Subscription`] that removes `f` again.
//!
//! # Thread Safety
//!
//! The value sits behind a `parking_lot::RwLock` and is never borrowed
//! across a subscriber call, so subscribers may freely read or write the
//! signal that notified them.

use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::subscriber::{SubscriberSet, Subscription};
use crate::graph::TargetId;

struct SignalInner<T> {
    id: TargetId,
    value: RwLock<T>,
    subscribers: SubscriberSet<T>,
}

/// A reactive cell holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. Must be Clone + PartialEq
///   + Send + Sync; equality decides whether a write notifies.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
/// let sub = count.subscribe(|v| println!("count = {v}"));
///
/// count.set(0); // equal, nothing printed
/// count.set(5); // prints "count = 5"
///
/// sub.unsubscribe();
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: TargetId::new(),
                value: RwLock::new(value),
                subscribers: SubscriberSet::new(),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value without cloning it.
    ///
    /// The signal is read-locked while `f` runs, so `f` must not write to
    /// this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Store `value` and notify subscribers if it differs from the current
    /// value.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut guard = self.inner.value.write();
            if *guard == value {
                return false;
            }
            *guard = value.clone();
        }

        self.inner.subscribers.notify(&value);
        true
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = self.with(f);
        self.set(new_value)
    }

    /// Register a callback invoked with each new value.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.subscribers.insert(Arc::new(callback));
        let weak: Weak<SignalInner<T>> = Arc::downgrade(&self.inner);

        Subscription::new(id, move |id| {
            weak.upgrade()
                .map(|inner| inner.subscribers.remove(id))
                .unwrap_or(false)
        })
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

/// Create a signal. Shorthand for [`Signal::new`].
pub fn create_signal<T>(value: T) -> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Signal::new(value)
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
