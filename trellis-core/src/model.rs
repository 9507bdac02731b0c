//! Model
//!
//! A model backs every key of a flat record with its own [`Signal`] and
//! adds whole-record operations on top: subscriptions to any change,
//! batched patches, reset to the initial state, and snapshots.
//!
//! Models do not go through the proxy layer and do not take part in effect
//! tracking; they are push-based like signals.
//!
//! # Keys
//!
//! The set of keys is fixed when the model is built. Writing or subscribing
//! to any other key is an error; patches ignore unknown keys.
//!
//! # Values
//!
//! State is held as `serde_json` values, so any `Serialize` type can seed,
//! patch or be read back from a model. Values are owned: a snapshot is
//! independent of the model and of later snapshots.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use crate::error::{ReactiveError, Result};
use crate::reactive::subscriber::SubscriberSet;
use crate::reactive::{Signal, Subscription};

/// A point-in-time copy of a model's state, in key order.
pub type Snapshot = JsonMap<String, JsonValue>;

struct ModelInner {
    signals: IndexMap<String, Signal<JsonValue>>,

    /// The initial state, restored by `reset`.
    baseline: Snapshot,

    subscribers: SubscriberSet<Snapshot>,
}

/// A keyed composition of signals.
///
/// # Example
///
/// ```rust,ignore
/// let form = model(&json!({ "a": 1, "b": 2 }))?;
/// let _sub = form.subscribe(|snapshot| println!("{snapshot:?}"));
///
/// form.patch_with(&json!({ "a": 1, "b": 1 }))?; // prints {"a": 1, "b": 1}
/// form.reset();                                // prints {"a": 1, "b": 2}
/// ```
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    /// Build a model with one signal per key of `state`.
    pub fn new(state: Snapshot) -> Self {
        let signals = state
            .iter()
            .map(|(key, value)| (key.clone(), Signal::new(value.clone())))
            .collect();

        Self {
            inner: Arc::new(ModelInner {
                signals,
                baseline: state,
                subscribers: SubscriberSet::new(),
            }),
        }
    }

    /// Build a model from anything that serializes to a record.
    pub fn from_serialize<S>(state: &S) -> Result<Self>
    where
        S: Serialize + ?Sized,
    {
        Ok(Self::new(to_record(state)?))
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.inner.signals.get(key).map(Signal::get)
    }

    /// The backed keys, in their initial order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.signals.keys().map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.signals.contains_key(key)
    }

    /// The signal backing `key`.
    pub fn signal(&self, key: &str) -> Option<&Signal<JsonValue>> {
        self.inner.signals.get(key)
    }

    /// Write one key.
    ///
    /// Key subscribers hear about real changes only; whole-model subscribers
    /// are notified after every write. Returns whether the value changed.
    pub fn set(&self, key: &str, value: impl Into<JsonValue>) -> Result<bool> {
        let signal = self.backing(key)?;
        let value = value.into();
        let changed = !signal.with(|current| same_json(current, &value));
        if changed {
            signal.set(value);
        }
        self.notify();
        Ok(changed)
    }

    /// Register a callback invoked with a fresh snapshot after any change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let id = self.inner.subscribers.insert(Arc::new(callback));
        let weak: Weak<ModelInner> = Arc::downgrade(&self.inner);

        Subscription::new(id, move |id| {
            weak.upgrade()
                .map(|inner| inner.subscribers.remove(id))
                .unwrap_or(false)
        })
    }

    /// Register a callback invoked with each new value of `key`.
    pub fn subscribe_key<F>(&self, key: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(&JsonValue) + Send + Sync + 'static,
    {
        Ok(self.backing(key)?.subscribe(callback))
    }

    /// Apply every changed key of `updates`, then notify whole-model
    /// subscribers once.
    ///
    /// Keys the model does not back are ignored. Returns whether anything
    /// changed; a patch that changes nothing notifies nobody.
    pub fn patch(&self, updates: Snapshot) -> bool {
        let batch: Vec<(&Signal<JsonValue>, JsonValue)> = updates
            .into_iter()
            .filter_map(|(key, value)| {
                let signal = self.inner.signals.get(&key)?;
                let changed = !signal.with(|current| same_json(current, &value));
                changed.then_some((signal, value))
            })
            .collect();

        if batch.is_empty() {
            return false;
        }

        debug!(keys = batch.len(), "patching model");
        for (signal, value) in batch {
            signal.set(value);
        }
        self.notify();
        true
    }

    /// [`Model::patch`] from anything that serializes to a record.
    pub fn patch_with<S>(&self, updates: &S) -> Result<bool>
    where
        S: Serialize + ?Sized,
    {
        Ok(self.patch(to_record(updates)?))
    }

    /// Restore the initial state, as a single patch.
    pub fn reset(&self) -> bool {
        self.patch(self.inner.baseline.clone())
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        self.inner
            .signals
            .iter()
            .map(|(key, signal)| (key.clone(), signal.get()))
            .collect()
    }

    /// The current state deserialized into `T`.
    pub fn snapshot_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(JsonValue::Object(self.snapshot()))?)
    }

    fn backing(&self, key: &str) -> Result<&Signal<JsonValue>> {
        self.inner
            .signals
            .get(key)
            .ok_or_else(|| ReactiveError::UnknownKey(key.to_owned()))
    }

    fn notify(&self) {
        if !self.inner.subscribers.is_empty() {
            let snapshot = self.snapshot();
            self.inner.subscribers.notify(&snapshot);
        }
    }
}

/// Create a model. Shorthand for [`Model::from_serialize`].
pub fn model<S>(state: &S) -> Result<Model>
where
    S: Serialize + ?Sized,
{
    Model::from_serialize(state)
}

fn to_record<S>(value: &S) -> Result<Snapshot>
where
    S: Serialize + ?Sized,
{
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(ReactiveError::NotARecord(json_kind(&other))),
    }
}

/// Value equality for model state. Numbers compare numerically, so `1` and
/// `1.0` are the same value.
fn same_json(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (JsonValue::Array(xs), JsonValue::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_json(x, y))
        }
        (JsonValue::Object(xs), JsonValue::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| same_json(x, y)))
        }
        _ => a == b,
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "sequence",
        JsonValue::Object(_) => "record",
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("state", &self.snapshot())
            .field("subscriber_count", &self.inner.subscribers.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
