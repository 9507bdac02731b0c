//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects observed values
//! and the computations that read them. It owns the dependency store:
//!
//! ```text
//! target id -> key -> { computations that read (target, key) in their last run }
//! ```
//!
//! # How It Works
//!
//! 1. While a computation runs, every tracked read calls [`Runtime::track`],
//!    which adds the computation to the dependency set of `(target, key)`
//!    and remembers the set on the computation for later cleanup.
//!
//! 2. Before each run the computation removes itself from every set it is
//!    in, so the store only ever reflects the most recent run.
//!
//! 3. A write calls [`Runtime::trigger`], which snapshots the dependency set
//!    and runs (or schedules) the computations, parents before children.
//!
//! # Thread Safety
//!
//! The store is a global `DashMap`; dependency sets are individually
//! locked. No lock is held while a computation or scheduler runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::{EffectCore, EffectHandle};
use super::subscriber::SubscriberId;
use crate::graph::{order_by_depth, TargetId, TrackKey};

/// A computation that can be registered in the dependency store.
///
/// Implemented by every effect regardless of its result type, so that
/// dependency sets, parents and schedulers can hold them uniformly.
pub(crate) trait Computation: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Shared lifecycle state.
    fn core(&self) -> &EffectCore;

    /// Run the computation, discarding its result.
    fn rerun(self: Arc<Self>);
}

/// The set of computations depending on one `(target, key)`.
#[derive(Default)]
pub(crate) struct Dep {
    subscribers: Mutex<IndexMap<SubscriberId, Arc<dyn Computation>>>,
}

impl Dep {
    /// Returns `false` if the computation was already present.
    fn insert(&self, computation: &Arc<dyn Computation>) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(&computation.subscriber_id()) {
            return false;
        }
        subscribers.insert(computation.subscriber_id(), Arc::clone(computation));
        true
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        let removed = self.subscribers.lock().shift_remove(&id);
        drop(removed);
    }

    fn snapshot(&self) -> Vec<Arc<dyn Computation>> {
        self.subscribers.lock().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep").field("len", &self.len()).finish()
    }
}

type KeyMap = HashMap<TrackKey, Arc<Dep>>;

static STORE: OnceLock<DashMap<TargetId, KeyMap>> = OnceLock::new();

fn store() -> &'static DashMap<TargetId, KeyMap> {
    STORE.get_or_init(DashMap::new)
}

/// The global reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Record that the current computation reads `(target, key)`.
    ///
    /// A no-op when no computation is collecting dependencies.
    pub fn track(target: TargetId, key: impl Into<TrackKey>) {
        let Some(current) = ReactiveContext::current() else {
            return;
        };
        let key = key.into();

        let dep = Arc::clone(
            store()
                .entry(target)
                .or_default()
                .entry(key.clone())
                .or_default(),
        );

        if dep.insert(&current) {
            trace!(effect = %current.subscriber_id(), %target, %key, "tracked");
            current.core().record_dep(&dep);
        }
    }

    /// Re-run or schedule every computation that depends on `(target, key)`.
    ///
    /// The computation currently running is skipped unless it allows
    /// recursion, so an effect writing what it reads does not re-enter
    /// itself.
    pub fn trigger(target: TargetId, key: &TrackKey) {
        Self::trigger_all(target, std::slice::from_ref(key));
    }

    /// Trigger several keys of one target as a single change.
    ///
    /// A computation depending on more than one of the keys runs once.
    pub fn trigger_all(target: TargetId, keys: &[TrackKey]) {
        let deps: Vec<Arc<Dep>> = match store().get(&target) {
            Some(map) => keys.iter().filter_map(|key| map.get(key).cloned()).collect(),
            None => return,
        };

        let active = ReactiveContext::current_subscriber();
        let mut effects: IndexMap<SubscriberId, Arc<dyn Computation>> = IndexMap::new();
        for dep in &deps {
            for computation in dep.snapshot() {
                let id = computation.subscriber_id();
                if Some(id) != active || computation.core().allows_recursion() {
                    effects.entry(id).or_insert(computation);
                }
            }
        }

        if effects.is_empty() {
            return;
        }

        trace!(%target, ?keys, count = effects.len(), "triggered");
        Self::run_effects(effects.into_values().collect());
    }

    /// Run computations in ascending nesting depth.
    ///
    /// Each goes through its scheduler if it has one. Computations stopped
    /// by an earlier one in the same batch are skipped.
    pub(crate) fn run_effects(mut effects: Vec<Arc<dyn Computation>>) {
        order_by_depth(&mut effects, |c| c.core().depth());

        for effect in effects {
            if !effect.core().is_active() {
                continue;
            }
            match effect.core().scheduler().cloned() {
                Some(scheduler) => scheduler(&EffectHandle::new(effect)),
                None => effect.rerun(),
            }
        }
    }

    /// Number of computations currently depending on `(target, key)`.
    pub fn dependent_count(target: TargetId, key: &TrackKey) -> usize {
        store()
            .get(&target)
            .and_then(|keys| keys.get(key).map(|dep| dep.len()))
            .unwrap_or(0)
    }

    /// Whether the store holds any dependency sets for `target`.
    pub fn is_tracked(target: TargetId) -> bool {
        store().contains_key(&target)
    }

    /// Drop every dependency set of a target that no longer exists.
    pub(crate) fn release_target(target: TargetId) {
        let removed = store().remove(&target);
        drop(removed);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
