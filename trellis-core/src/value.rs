//! Tagged Value Model
//!
//! Observed state is made of [`Value`]s. Primitives are stored inline;
//! structured values live in a shared [`Target`], a record or sequence with
//! a process-unique identity that the dependency store is keyed by.
//!
//! # Identity and Copies
//!
//! Cloning a `Value::Object` clones a handle: both copies see the same
//! target and the same dependencies. [`Value::deep_clone`] produces an
//! independent structure with fresh identities. Two notions of equality
//! exist:
//!
//! - [`Value::same_value`] decides whether a write changed anything.
//!   Primitives compare by value (`NaN` equals itself), structured values by
//!   identity.
//! - `PartialEq` compares contents recursively.
//!
//! Cyclic structures are not supported by deep operations.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::error::{ReactiveError, Result};
use crate::graph::TargetId;
use crate::reactive::{reactive, Reactive, Runtime};

/// The contents of a structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Record(IndexMap<String, Value>),
    Sequence(Vec<Value>),
}

impl Shape {
    fn deep_clone(&self) -> Self {
        match self {
            Self::Record(map) => Self::Record(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.deep_clone()))
                    .collect(),
            ),
            Self::Sequence(items) => Self::Sequence(items.iter().map(Value::deep_clone).collect()),
        }
    }
}

struct TargetInner {
    id: TargetId,
    shape: RwLock<Shape>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        Runtime::release_target(self.id);
    }
}

/// A shared structured value with a stable identity.
#[derive(Clone)]
pub struct Target {
    inner: Arc<TargetInner>,
}

impl Target {
    /// An empty record.
    pub fn record() -> Self {
        Self::from_shape(Shape::Record(IndexMap::new()))
    }

    /// An empty sequence.
    pub fn sequence() -> Self {
        Self::from_shape(Shape::Sequence(Vec::new()))
    }

    pub fn from_shape(shape: Shape) -> Self {
        Self {
            inner: Arc::new(TargetInner {
                id: TargetId::new(),
                shape: RwLock::new(shape),
            }),
        }
    }

    /// A record built from key/value pairs, in order.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::from_shape(Shape::Record(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into().to_raw()))
                .collect(),
        ))
    }

    /// A sequence built from values, in order.
    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::from_shape(Shape::Sequence(
            values.into_iter().map(|value| value.into().to_raw()).collect(),
        ))
    }

    /// Build a target from a JSON object or array.
    pub fn from_json(json: JsonValue) -> Result<Self> {
        match Value::from(json) {
            Value::Object(target) => Ok(target),
            other => Err(ReactiveError::NotStructured(other.kind())),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn is_sequence(&self) -> bool {
        matches!(*self.read(), Shape::Sequence(_))
    }

    /// Whether both handles refer to the same target.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Clone of the current contents. Nested targets are shared.
    pub fn shape(&self) -> Shape {
        self.read().clone()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Shape> {
        self.inner.shape.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Shape> {
        self.inner.shape.write()
    }

    /// An independent copy with fresh identities all the way down.
    pub fn deep_clone(&self) -> Target {
        let shape = self.read().deep_clone();
        Target::from_shape(shape)
    }

    pub fn to_json(&self) -> JsonValue {
        match &*self.read() {
            Shape::Record(map) => JsonValue::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<JsonMap<_, _>>(),
            ),
            Shape::Sequence(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.read() == *other.read()
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.inner.id)
            .field("shape", &*self.read())
            .finish()
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &*self.read() {
            Shape::Record(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Shape::Sequence(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(item)?;
                }
                out.end()
            }
        }
    }
}

/// A value held by an observed target.
///
/// `Reactive` only ever appears in values handed out by a proxy; stored
/// values always hold the raw `Object`.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Target),
    Reactive(Reactive),
}

impl Value {
    /// A short name for the kind of value, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(target) => target_kind(target),
            Self::Reactive(proxy) => target_kind(proxy.target()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The structured target behind an `Object` or `Reactive`.
    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Self::Object(target) => Some(target),
            Self::Reactive(proxy) => Some(proxy.target()),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Self::Reactive(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Whether a write of `other` over `self` changes nothing.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => same_number(*a, *b),
            (Self::String(a), Self::String(b)) => a == b,
            _ => match (self.as_target(), other.as_target()) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            },
        }
    }

    /// Replace a proxy by its raw target.
    pub fn to_raw(self) -> Value {
        match self {
            Self::Reactive(proxy) => Self::Object(proxy.raw()),
            other => other,
        }
    }

    /// An independent copy; structured values get fresh identities.
    pub fn deep_clone(&self) -> Value {
        match self.as_target() {
            Some(target) => Self::Object(target.deep_clone()),
            None => self.clone(),
        }
    }

    /// Wrap a structured value in its proxy.
    pub fn into_reactive(self) -> Result<Reactive> {
        match self {
            Self::Reactive(proxy) => Ok(proxy),
            Self::Object(target) => Ok(reactive(target)),
            other => Err(ReactiveError::NotStructured(other.kind())),
        }
    }

    /// Convert to JSON. Integral numbers become JSON integers; non-finite
    /// numbers become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Object(target) => target.to_json(),
            Self::Reactive(proxy) => proxy.target().to_json(),
        }
    }
}

fn target_kind(target: &Target) -> &'static str {
    if target.is_sequence() {
        "sequence"
    } else {
        "record"
    }
}

fn same_number(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn number_to_json(n: f64) -> JsonValue {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        JsonValue::from(n as i64)
    } else {
        JsonNumber::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_target(), other.as_target()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.same_value(other),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Self::Object(target)
    }
}

impl From<Reactive> for Value {
    fn from(proxy: Reactive) -> Self {
        Self::Reactive(proxy)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::Object(Target::from_shape(Shape::Sequence(
                items.into_iter().map(Value::from).collect(),
            ))),
            JsonValue::Object(map) => Self::Object(Target::from_shape(Shape::Record(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ))),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => number_to_json(*n).serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Object(target) => target.serialize(serializer),
            Self::Reactive(proxy) => proxy.target().serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Value::from)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
