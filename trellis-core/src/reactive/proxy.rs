//! Observable Proxy
//!
//! A [`Reactive`] is an accessor handle over a [`Target`]. Every read goes
//! through [`Runtime::track`] and every effective write through
//! [`Runtime::trigger`], so effects that read through a proxy re-run when
//! what they read changes.
//!
//! # How Proxies Work
//!
//! 1. Reads track the key they touch and return the stored value. Nested
//!    structured values come back wrapped in their own proxy, so
//!    dependencies are only established for paths actually read.
//!
//! 2. Writes compare the old and new value with [`Value::same_value`] and
//!    trigger only when something changed. Adding or removing a record key
//!    also triggers the iteration key.
//!
//! 3. Length-changing sequence operations (`push`, `pop`, `shift`,
//!    `unshift`, `splice`) mutate the raw sequence once, then trigger the
//!    length key, the iteration key and a key named after the operation,
//!    exactly once per call however many elements moved.
//!
//! # Identity
//!
//! Each target has at most one live proxy. Wrapping the same target twice
//! returns the same proxy; wrapping a proxy returns it unchanged. The cache
//! holds weak references, so a proxy nobody holds is freed and a later wrap
//! creates a new one.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use smallvec::{smallvec, SmallVec};

use super::runtime::Runtime;
use crate::error::{ReactiveError, Result};
use crate::graph::{ArrayMethod, TargetId, TrackKey};
use crate::value::{Shape, Target, Value};

/// Reserved introspection keys.
///
/// They are answered by every proxy, never tracked, never stored and never
/// listed by [`Reactive::keys`].
pub struct ReactiveFlags;

impl ReactiveFlags {
    /// Reads as `Bool(true)` on any proxy.
    pub const IS_REACTIVE: &'static str = "__v_isReactive";

    /// Reads as the raw target behind the proxy.
    pub const RAW: &'static str = "__v_raw";

    pub fn is_reserved(key: &str) -> bool {
        key == Self::IS_REACTIVE || key == Self::RAW
    }
}

struct ProxyInner {
    target: Target,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        cache().remove_if(&self.target.id(), |_, weak| weak.strong_count() == 0);
    }
}

/// Longest sequence a proxy will grow to through index or length writes.
pub const MAX_SEQUENCE_LEN: usize = u32::MAX as usize;

static PROXY_CACHE: OnceLock<DashMap<TargetId, Weak<ProxyInner>>> = OnceLock::new();

fn cache() -> &'static DashMap<TargetId, Weak<ProxyInner>> {
    PROXY_CACHE.get_or_init(DashMap::new)
}

/// Outcome of a single-slot write.
enum Write {
    Unchanged,
    Replaced(Value),
    Added,
}

/// A tracking handle over an observed target.
#[derive(Clone)]
pub struct Reactive {
    inner: Arc<ProxyInner>,
}

impl Reactive {
    fn for_target(target: Target) -> Self {
        let id = target.id();

        let cached = cache().get(&id).and_then(|weak| weak.upgrade());
        if let Some(inner) = cached {
            return Self { inner };
        }

        let created = Arc::new(ProxyInner { target });
        let inner = {
            let mut entry = cache().entry(id).or_default();
            match entry.upgrade() {
                Some(existing) => existing,
                None => {
                    *entry = Arc::downgrade(&created);
                    Arc::clone(&created)
                }
            }
        };

        Self { inner }
    }

    pub fn id(&self) -> TargetId {
        self.inner.target.id()
    }

    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    /// The raw target behind this proxy.
    pub fn raw(&self) -> Target {
        self.inner.target.clone()
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_sequence(&self) -> bool {
        self.inner.target.is_sequence()
    }

    // ---- Reads ----

    /// Read a record field, a sequence index, or a sequence's `"length"`.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            ReactiveFlags::IS_REACTIVE => return Some(Value::Bool(true)),
            ReactiveFlags::RAW => return Some(Value::Object(self.raw())),
            _ => {}
        }

        let id = self.id();
        let (value, keys): (_, SmallVec<[TrackKey; 2]>) = {
            let shape = self.target().read();
            match &*shape {
                Shape::Record(map) => (map.get(key).cloned(), smallvec![TrackKey::from(key)]),
                Shape::Sequence(items) if key == "length" => (
                    Some(Value::from(items.len())),
                    smallvec![TrackKey::Length, TrackKey::Iterate],
                ),
                Shape::Sequence(items) => match parse_index(key) {
                    Some(index) => (items.get(index).cloned(), smallvec![TrackKey::Index(index)]),
                    None => (None, smallvec![TrackKey::from(key)]),
                },
            }
        };

        for key in keys {
            Runtime::track(id, key);
        }
        value.map(wrap)
    }

    /// Read a sequence element. On a record, reads the field named by the
    /// decimal index.
    pub fn at(&self, index: usize) -> Option<Value> {
        self.get(&index.to_string())
    }

    /// Follow a dotted path such as `"user.tags.0"`, tracking each step.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = current.as_reactive()?.get(segment)?;
        }
        Some(current)
    }

    /// Number of elements, or of keys for a record.
    pub fn len(&self) -> usize {
        let (len, sequence) = {
            let shape = self.target().read();
            match &*shape {
                Shape::Record(map) => (map.len(), false),
                Shape::Sequence(items) => (items.len(), true),
            }
        };

        if sequence {
            Runtime::track(self.id(), TrackKey::Length);
        }
        Runtime::track(self.id(), TrackKey::Iterate);
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` exists. Re-runs the reader when it is added or removed.
    pub fn has(&self, key: &str) -> bool {
        if ReactiveFlags::is_reserved(key) {
            return false;
        }

        let (present, tracked) = {
            let shape = self.target().read();
            match &*shape {
                Shape::Record(map) => (map.contains_key(key), TrackKey::from(key)),
                Shape::Sequence(_) if key == "length" => (true, TrackKey::Length),
                Shape::Sequence(items) => match parse_index(key) {
                    Some(index) => (index < items.len(), TrackKey::Index(index)),
                    None => (false, TrackKey::from(key)),
                },
            }
        };

        Runtime::track(self.id(), tracked);
        Runtime::track(self.id(), TrackKey::Iterate);
        present
    }

    /// Record keys in insertion order, or sequence indices.
    pub fn keys(&self) -> Vec<String> {
        let (keys, sequence): (Vec<String>, bool) = {
            let shape = self.target().read();
            match &*shape {
                Shape::Record(map) => (map.keys().cloned().collect(), false),
                Shape::Sequence(items) => ((0..items.len()).map(|i| i.to_string()).collect(), true),
            }
        };

        Runtime::track(self.id(), TrackKey::Iterate);
        if sequence {
            Runtime::track(self.id(), TrackKey::Length);
        }
        keys
    }

    /// Every key with its value, tracking each read.
    pub fn entries(&self) -> Vec<(String, Value)> {
        let id = self.id();
        let (entries, sequence): (Vec<(String, Value)>, bool) = {
            let shape = self.target().read();
            match &*shape {
                Shape::Record(map) => (
                    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    false,
                ),
                Shape::Sequence(items) => (
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, v)| (i.to_string(), v.clone()))
                        .collect(),
                    true,
                ),
            }
        };

        Runtime::track(id, TrackKey::Iterate);
        if sequence {
            Runtime::track(id, TrackKey::Length);
        }
        entries
            .into_iter()
            .enumerate()
            .map(|(index, (key, value))| {
                if sequence {
                    Runtime::track(id, TrackKey::Index(index));
                } else {
                    Runtime::track(id, key.as_str());
                }
                (key, wrap(value))
            })
            .collect()
    }

    /// Every value, in order.
    pub fn to_vec(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    // ---- Writes ----

    /// Write a record field. On a sequence, writes an index or `"length"`.
    ///
    /// Returns whether anything changed. Reserved keys are ignored.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        if ReactiveFlags::is_reserved(key) {
            return false;
        }
        let value = value.into().to_raw();

        if self.is_sequence() {
            if key == "length" {
                return match value.as_f64() {
                    Some(n) if is_length(n) => self.set_len(n as usize).unwrap_or(false),
                    _ => false,
                };
            }
            return match parse_index(key) {
                Some(index) => self.set_at(index, value),
                None => false,
            };
        }

        let outcome = {
            let mut shape = self.target().write();
            let Shape::Record(map) = &mut *shape else {
                return false;
            };
            match map.get_mut(key) {
                Some(slot) if slot.same_value(&value) => Write::Unchanged,
                Some(slot) => Write::Replaced(std::mem::replace(slot, value)),
                None => {
                    map.insert(key.to_owned(), value);
                    Write::Added
                }
            }
        };

        let id = self.id();
        match outcome {
            Write::Unchanged => false,
            Write::Replaced(_old) => {
                Runtime::trigger(id, &TrackKey::from(key));
                true
            }
            Write::Added => {
                Runtime::trigger_all(id, &[TrackKey::from(key), TrackKey::Iterate]);
                true
            }
        }
    }

    /// Write a sequence element, padding with `Null` past the end.
    ///
    /// Triggers the index, length and iteration keys when the value
    /// changed. On a record, writes the field named by the decimal index.
    /// An index at or past [`MAX_SEQUENCE_LEN`], or one whose padding cannot
    /// be allocated, writes nothing.
    pub fn set_at(&self, index: usize, value: impl Into<Value>) -> bool {
        let value = value.into().to_raw();
        if !self.is_sequence() {
            return self.set(&index.to_string(), value);
        }

        let outcome = {
            let mut shape = self.target().write();
            let Shape::Sequence(items) = &mut *shape else {
                return false;
            };
            match items.get_mut(index) {
                Some(slot) if slot.same_value(&value) => Write::Unchanged,
                Some(slot) => Write::Replaced(std::mem::replace(slot, value)),
                None if index >= MAX_SEQUENCE_LEN => Write::Unchanged,
                None => {
                    if items.try_reserve(index + 1 - items.len()).is_err() {
                        return false;
                    }
                    items.resize(index, Value::Null);
                    items.push(value);
                    Write::Added
                }
            }
        };

        if matches!(outcome, Write::Unchanged) {
            return false;
        }

        Runtime::trigger_all(
            self.id(),
            &[TrackKey::Index(index), TrackKey::Length, TrackKey::Iterate],
        );
        true
    }

    /// Truncate or pad a sequence with `Null`.
    ///
    /// Lengths above [`MAX_SEQUENCE_LEN`], or padding that cannot be
    /// allocated, are an [`ReactiveError::InvalidLength`].
    pub fn set_len(&self, len: usize) -> Result<bool> {
        let id = self.id();
        if len > MAX_SEQUENCE_LEN {
            return Err(ReactiveError::InvalidLength(len));
        }
        let dropped = {
            let mut shape = self.target().write();
            let Shape::Sequence(items) = &mut *shape else {
                return Err(ReactiveError::NotASequence(id));
            };
            if items.len() == len {
                return Ok(false);
            }
            if len < items.len() {
                items.split_off(len)
            } else {
                items
                    .try_reserve(len - items.len())
                    .map_err(|_| ReactiveError::InvalidLength(len))?;
                items.resize(len, Value::Null);
                Vec::new()
            }
        };

        let mut keys: SmallVec<[TrackKey; 4]> = smallvec![TrackKey::Length, TrackKey::Iterate];
        keys.extend((len..len + dropped.len()).map(TrackKey::Index));
        Runtime::trigger_all(id, &keys);
        Ok(true)
    }

    /// Remove a record key. On a sequence, deletes an index.
    ///
    /// Returns whether the key existed.
    pub fn delete(&self, key: &str) -> bool {
        if ReactiveFlags::is_reserved(key) {
            return false;
        }
        if self.is_sequence() {
            return parse_index(key).is_some_and(|index| self.delete_at(index));
        }

        let removed = {
            let mut shape = self.target().write();
            match &mut *shape {
                Shape::Record(map) => map.shift_remove(key),
                Shape::Sequence(_) => None,
            }
        };
        if removed.is_none() {
            return false;
        }

        Runtime::trigger_all(self.id(), &[TrackKey::from(key), TrackKey::Iterate]);
        true
    }

    /// Clear a sequence slot, leaving a `Null` hole. The length is kept.
    pub fn delete_at(&self, index: usize) -> bool {
        if !self.is_sequence() {
            return self.delete(&index.to_string());
        }

        let removed = {
            let mut shape = self.target().write();
            match &mut *shape {
                Shape::Sequence(items) => items
                    .get_mut(index)
                    .map(|slot| std::mem::replace(slot, Value::Null)),
                Shape::Record(_) => None,
            }
        };
        if removed.is_none() {
            return false;
        }

        Runtime::trigger_all(
            self.id(),
            &[TrackKey::Index(index), TrackKey::Length, TrackKey::Iterate],
        );
        true
    }

    // ---- Sequence operations ----

    /// Append a value. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into().to_raw();
        self.mutate(ArrayMethod::Push, |items| {
            items.push(value);
            items.len()
        })
    }

    /// Append several values as a single push. Returns the new length.
    pub fn extend<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<usize> {
        let values: Vec<Value> = values.into_iter().map(|v| v.into().to_raw()).collect();
        self.mutate(ArrayMethod::Push, |items| {
            items.extend(values);
            items.len()
        })
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Option<Value>> {
        self.mutate(ArrayMethod::Pop, Vec::pop)
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Result<Option<Value>> {
        self.mutate(ArrayMethod::Shift, |items| {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        })
    }

    /// Prepend a value. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into().to_raw();
        self.mutate(ArrayMethod::Unshift, |items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Remove `delete_count` elements from `start` and insert `values` in
    /// their place. Out-of-range bounds are clamped.
    ///
    /// Returns the removed elements.
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Vec<Value>> {
        let values: Vec<Value> = values.into_iter().map(|v| v.into().to_raw()).collect();
        self.mutate(ArrayMethod::Splice, |items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items.splice(start..end, values).collect()
        })
    }

    /// Apply `op` to the raw sequence, then trigger once.
    ///
    /// Values returned by `op` are raw, as stored.
    fn mutate<R>(&self, method: ArrayMethod, op: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R> {
        let id = self.id();
        let result = {
            let mut shape = self.target().write();
            match &mut *shape {
                Shape::Sequence(items) => op(items),
                Shape::Record(_) => return Err(ReactiveError::NotASequence(id)),
            }
        };

        Runtime::trigger_all(
            id,
            &[TrackKey::Length, TrackKey::Iterate, TrackKey::Method(method)],
        );
        Ok(result)
    }
}

fn wrap(value: Value) -> Value {
    match value {
        Value::Object(target) => Value::Reactive(Reactive::for_target(target)),
        other => other,
    }
}

/// A whole number a sequence length can be set to.
fn is_length(n: f64) -> bool {
    (0.0..=MAX_SEQUENCE_LEN as f64).contains(&n) && n.fract() == 0.0
}

/// Canonical decimal index: digits only, no leading zeros.
fn parse_index(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'));
    if canonical {
        key.parse().ok()
    } else {
        None
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reactive").field(&self.inner.target).finish()
    }
}

/// Anything [`reactive`] can wrap.
pub trait Observe {
    fn observe(self) -> Reactive;
}

impl Observe for Target {
    fn observe(self) -> Reactive {
        Reactive::for_target(self)
    }
}

impl Observe for &Target {
    fn observe(self) -> Reactive {
        Reactive::for_target(self.clone())
    }
}

impl Observe for Reactive {
    fn observe(self) -> Reactive {
        self
    }
}

impl Observe for &Reactive {
    fn observe(self) -> Reactive {
        self.clone()
    }
}

/// Wrap a target in its proxy.
///
/// Returns the cached proxy if the target already has one, and a proxy
/// unchanged.
pub fn reactive(target: impl Observe) -> Reactive {
    target.observe()
}

/// Whether a value is a proxy.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

/// The raw value behind a proxy; other values are returned as they are.
pub fn to_raw(value: &Value) -> Value {
    value.clone().to_raw()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn state(json: serde_json::Value) -> Reactive {
        reactive(Target::from_json(json).expect("structured json"))
    }

    fn count_runs(body: impl Fn() + Send + Sync + 'static) -> Arc<AtomicI32> {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        // The effect stays alive through its dependency sets
        effect(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            body();
        });
        runs
    }

    #[test]
    fn wrapping_is_cached_and_idempotent() {
        let target = Target::record();
        let a = reactive(&target);
        let b = reactive(target.clone());
        let c = reactive(&a);

        assert!(a.ptr_eq(&b));
        assert!(a.ptr_eq(&c));
        assert!(to_raw(&Value::from(a.clone())) == Value::Object(target.clone()));
        assert!(a.raw().ptr_eq(&target));
    }

    #[test]
    fn reserved_keys_answer_introspection() {
        let proxy = state(json!({ "a": 1 }));

        assert_eq!(proxy.get(ReactiveFlags::IS_REACTIVE), Some(Value::Bool(true)));
        let raw = proxy.get(ReactiveFlags::RAW).and_then(|v| v.as_target().cloned());
        assert!(raw.is_some_and(|raw| raw.ptr_eq(proxy.target())));

        assert!(!proxy.set(ReactiveFlags::RAW, 1));
        assert_eq!(proxy.keys(), vec!["a".to_owned()]);
        assert!(!proxy.has(ReactiveFlags::IS_REACTIVE));
    }

    #[test]
    fn nested_reads_return_cached_proxies() {
        let proxy = state(json!({ "user": { "name": "ada" } }));

        let first = proxy.get("user");
        let second = proxy.get("user");
        assert!(first.as_ref().is_some_and(is_reactive));
        assert_eq!(
            first.and_then(|v| v.as_reactive().cloned()),
            second.and_then(|v| v.as_reactive().cloned())
        );
        assert_eq!(proxy.get_path("user.name"), Some(Value::from("ada")));
        assert_eq!(proxy.get_path("user.missing.deeper"), None);
    }

    #[test]
    fn writes_store_raw_targets() {
        let proxy = state(json!({}));
        let inner = state(json!({ "x": 1 }));

        proxy.set("inner", inner.clone());
        let stored = match &*proxy.target().read() {
            Shape::Record(map) => map.get("inner").cloned(),
            Shape::Sequence(_) => None,
        };
        assert!(matches!(stored, Some(Value::Object(t)) if t.ptr_eq(inner.target())));
    }

    #[test]
    fn field_write_reruns_readers_once() {
        let proxy = state(json!({ "count": 0, "other": 0 }));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = proxy.clone();
        let seen_clone = seen.clone();
        let runs = count_runs(move || {
            seen_clone.lock().push(reader.get("count"));
        });

        proxy.set("count", 1);
        proxy.set("count", 1);
        proxy.set("other", 5);

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(
            *seen.lock(),
            vec![Some(Value::from(0)), Some(Value::from(1))]
        );
    }

    #[test]
    fn key_addition_and_removal_rerun_enumerators() {
        let proxy = state(json!({ "a": 1 }));
        let reader = proxy.clone();
        let runs = count_runs(move || {
            reader.keys();
        });

        proxy.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        proxy.set("b", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert!(proxy.delete("a"));
        assert!(!proxy.delete("a"));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn has_tracks_the_key_and_iteration() {
        let proxy = state(json!({}));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let reader = proxy.clone();
        let seen_clone = seen.clone();
        count_runs(move || seen_clone.lock().push(reader.has("flag")));

        proxy.set("flag", true);
        proxy.delete("flag");
        assert_eq!(*seen.lock(), vec![false, true, false]);
    }

    #[test]
    fn push_triggers_length_readers_once() {
        let list = state(json!([1, 2, 3]));
        let reader = list.clone();
        let runs = count_runs(move || {
            reader.len();
        });

        assert_eq!(list.push(4).ok(), Some(4));
        assert_eq!(list.get("length"), Some(Value::from(4)));
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        list.splice(0, 2, [9, 9, 9]).ok();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(list.target().to_json(), json!([9, 9, 9, 3, 4]));
    }

    #[test]
    fn method_keys_are_triggered() {
        let list = state(json!([]));
        let id = list.id();
        let runs = count_runs(move || Runtime::track(id, TrackKey::Method(ArrayMethod::Pop)));

        // Even a pop on an empty sequence triggers
        assert_eq!(list.pop().ok(), Some(None));
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        list.push(1).ok();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn index_writes_notify_length_and_iteration() {
        let list = state(json!(["a", "b"]));
        let reader = list.clone();
        let runs = count_runs(move || {
            reader.len();
        });

        assert!(list.set_at(0, "z"));
        assert!(!list.set_at(0, "z"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // Writing past the end pads with nulls
        assert!(list.set("3", "d"));
        assert_eq!(list.target().to_json(), json!(["z", "b", null, "d"]));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn truncation_triggers_dropped_indices() {
        let list = state(json!([1, 2, 3]));
        let reader = list.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        count_runs(move || seen_clone.lock().push(reader.at(2)));

        assert_eq!(list.set_len(1).ok(), Some(true));
        assert_eq!(list.set_len(1).ok(), Some(false));
        assert_eq!(*seen.lock(), vec![Some(Value::from(3)), None]);
    }

    #[test]
    fn oversized_lengths_and_indices_are_rejected() {
        let list = state(json!([1, 2]));
        let reader = list.clone();
        let runs = count_runs(move || {
            reader.len();
        });

        assert!(!list.set("length", 1e20));
        assert!(!list.set("length", -1));
        assert!(!list.set_at(usize::MAX, 1));
        assert!(!list.set_at(MAX_SEQUENCE_LEN, 1));
        assert!(matches!(
            list.set_len(MAX_SEQUENCE_LEN + 1),
            Err(ReactiveError::InvalidLength(len)) if len == MAX_SEQUENCE_LEN + 1
        ));

        assert_eq!(list.target().to_json(), json!([1, 2]));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delete_at_leaves_a_hole() {
        let list = state(json!([1, 2]));
        assert!(list.delete_at(0));
        assert!(!list.delete_at(5));
        assert_eq!(list.to_vec(), vec![Value::Null, Value::from(2)]);
    }

    #[test]
    fn sequence_operations_reject_records() {
        let record = state(json!({ "a": 1 }));
        assert!(matches!(
            record.push(1),
            Err(ReactiveError::NotASequence(id)) if id == record.id()
        ));
        assert!(record.set_len(0).is_err());
        assert!(record.pop().is_err());
    }

    #[test]
    fn conditional_branches_drop_stale_dependencies() {
        let proxy = state(json!({ "ok": true, "a": 1, "b": 2 }));
        let reader = proxy.clone();
        let runs = count_runs(move || {
            let ok = reader.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
            if ok {
                reader.get("a");
            } else {
                reader.get("b");
            }
        });

        proxy.set("ok", false);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // `a` is no longer read
        proxy.set("a", 10);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(Runtime::dependent_count(proxy.id(), &"a".into()), 0);

        proxy.set("b", 20);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn index_keys_are_canonical() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index("01"), None);
        assert_eq!(parse_index("+1"), None);
        assert_eq!(parse_index(""), None);
    }
}
