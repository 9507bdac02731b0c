//! Reactive Primitives
//!
//! This module implements the core reactive system: observed values,
//! effects, computeds and signals. Together they form a fine-grained
//! dependency-tracking engine.
//!
//! # Concepts
//!
//! ## Proxies
//!
//! A [`Reactive`] wraps a structured [`Target`](crate::value::Target).
//! Reading a field through it inside a running effect registers the effect
//! as a dependent of that field; writing the field re-runs the dependents.
//!
//! ## Effects
//!
//! An Effect is a computation that runs once immediately and then again
//! whenever anything it read changes. Effects created inside other effects
//! are their children and are stopped with them.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates
//! only when read after one of its dependencies changed.
//!
//! ## Signals
//!
//! A Signal is a standalone value cell with push-style subscriptions. It is
//! not tracked by effects; the [`Model`](crate::model::Model) layer is built
//! from signals.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local context stack to detect
//! dependencies automatically. When a proxy is read, we check whether a
//! computation is running and, if so, register the dependency in the global
//! store.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod effect;
mod proxy;
mod reaction;
mod runtime;
mod signal;
pub(crate) mod subscriber;

pub use computed::{computed, Computed};
pub use context::{untracked, ReactiveContext};
pub use effect::{effect, effect_with, EffectHandle, EffectOptions, EffectRunner, Scheduler};
pub use proxy::{
    is_reactive, reactive, to_raw, Observe, Reactive, ReactiveFlags, MAX_SEQUENCE_LEN,
};
pub use reaction::{create_computed, create_effect, ComputedSignal};
pub use runtime::Runtime;
pub use signal::{create_signal, Signal};
pub use subscriber::{SubscriberId, Subscription};
