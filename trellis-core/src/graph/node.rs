//! Graph Nodes
//!
//! This module defines the identities that live in the dependency graph:
//! the observed target a dependency points at, and the key read on it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an observed target.
///
/// Every raw structured value, computed value and custom observable gets one.
/// The dependency store is keyed by this identity, never by contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A length-mutating sequence operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayMethod {
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
}

impl ArrayMethod {
    /// The operation's conventional name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pop => "pop",
            Self::Shift => "shift",
            Self::Unshift => "unshift",
            Self::Splice => "splice",
        }
    }
}

/// The key half of a `(target, key)` dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// A named record field.
    Field(String),

    /// A sequence element.
    Index(usize),

    /// The length of a sequence.
    Length,

    /// Key enumeration: fires when keys or elements are added or removed.
    Iterate,

    /// Fired once per call of a length-mutating sequence operation.
    ///
    /// Nothing in this crate tracks these keys; they are triggered so that
    /// consumers can observe a specific operation if they wish.
    Method(ArrayMethod),

    /// The single value of a computed or other scalar observable.
    Value,
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Length => f.write_str("length"),
            Self::Iterate => f.write_str("<iterate>"),
            Self::Method(method) => write!(f, "<{}>", method.name()),
            Self::Value => f.write_str("value"),
        }
    }
}

impl From<&str> for TrackKey {
    fn from(name: &str) -> Self {
        Self::Field(name.to_owned())
    }
}

impl From<String> for TrackKey {
    fn from(name: String) -> Self {
        Self::Field(name)
    }
}

impl From<usize> for TrackKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let id1 = TargetId::new();
        let id2 = TargetId::new();
        assert_ne!(id1, id2);
        assert!(id2.raw() > id1.raw());
    }

    #[test]
    fn keys_convert_from_names_and_indices() {
        assert_eq!(TrackKey::from("count"), TrackKey::Field("count".into()));
        assert_eq!(TrackKey::from(3), TrackKey::Index(3));
    }

    #[test]
    fn keys_display_readably() {
        assert_eq!(TrackKey::Length.to_string(), "length");
        assert_eq!(TrackKey::Index(2).to_string(), "[2]");
        assert_eq!(TrackKey::Method(ArrayMethod::Splice).to_string(), "<splice>");
    }
}
