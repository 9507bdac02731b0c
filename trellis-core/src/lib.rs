//! Trellis Core
//!
//! This crate provides a fine-grained reactive state engine. It records
//! which computations read which pieces of mutable state, and re-runs
//! exactly the affected computations when that state changes.
//!
//! It implements:
//!
//! - Observable proxies over records and sequences
//! - Effects with nesting, cleanup and custom schedulers
//! - Lazy cached computed values
//! - Signals and keyed models built from them
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `graph`: Dependency identities and update scheduling
//! - `value`: The tagged value model observed by proxies
//! - `model`: Keyed composition of signals
//! - `error`: The crate error type
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use trellis_core::{computed, effect, reactive, Target};
//!
//! let state = reactive(Target::from_json(json!({ "count": 0 }))?);
//!
//! // Create a derived value
//! let doubled = computed({
//!     let state = state.clone();
//!     move || state.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0) * 2.0
//! });
//!
//! // Create an effect
//! effect(move || println!("doubled: {}", doubled.get()));
//!
//! // Update the state
//! state.set("count", 5);
//! // Effect automatically runs, prints: "doubled: 10"
//! ```

pub mod error;
pub mod graph;
pub mod model;
pub mod reactive;
pub mod value;

pub use error::{ReactiveError, Result};
pub use graph::{ArrayMethod, JobQueue, TargetId, TrackKey};
pub use model::{model, Model, Snapshot};
pub use reactive::{
    computed, create_computed, create_effect, create_signal, effect, effect_with, is_reactive,
    reactive, to_raw, untracked, Computed, ComputedSignal, EffectHandle, EffectOptions,
    EffectRunner, Reactive, ReactiveFlags, Runtime, Signal, Subscription, MAX_SEQUENCE_LEN,
};
pub use value::{Shape, Target, Value};
