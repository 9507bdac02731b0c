//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when it is
//! read after one of its dependencies changed.
//!
//! # How Computeds Work
//!
//! 1. The getter is wrapped in an effect that is never run eagerly. Nothing
//!    is evaluated until the first read.
//!
//! 2. On read, a dirty computed runs the effect, caches the result and
//!    becomes clean. A clean computed returns the cache.
//!
//! 3. When a dependency changes, the effect's scheduler only marks the
//!    computed dirty and triggers the computed's own `Value` key. Readers of
//!    the computed re-run; the getter itself waits for the next read.
//!
//! # Why This Matters
//!
//! - A value changes
//! - 10 computeds depend on it
//! - Only the computeds actually read again will recompute
//! - Computeds that are never read stay dirty (no wasted work)
//!
//! # Ownership
//!
//! The wrapped effect is never adopted as a child of whichever effect
//! happens to read the computed first, so re-running or stopping that
//! effect leaves the computed working. Dropping the last handle stops the
//! effect and forgets the computed's dependents.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use super::context::ReactiveContext;
use super::effect::{EffectHandle, EffectInner, EffectOptions};
use super::runtime::{Computation, Runtime};
use crate::graph::{TargetId, TrackKey};

struct ComputedInner<T> {
    /// Identity under which readers track this computed.
    target: TargetId,

    /// Set by the scheduler, cleared by a refreshing read.
    dirty: AtomicBool,

    value: RwLock<Option<T>>,
    effect: Arc<EffectInner<T>>,
}

impl<T: 'static> ComputedInner<T> {
    fn invalidate(&self) {
        if !self.dirty.swap(true, Ordering::AcqRel) {
            debug!(computed = %self.target, "computed invalidated");
            Runtime::trigger(self.target, &TrackKey::Value);
        }
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.core().stop();
        Runtime::release_target(self.target);
    }
}

/// A lazily evaluated, cached value derived from observed state.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Target::from_json(json!({ "count": 0 }))?);
///
/// let doubled = computed({
///     let state = state.clone();
///     move || state.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0) * 2.0
/// });
///
/// assert_eq!(doubled.get(), 0.0);
/// state.set("count", 2);
/// assert!(doubled.is_dirty());
/// assert_eq!(doubled.get(), 4.0);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a computed value. The getter does not run until the first
    /// read.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let options = EffectOptions::new()
                .lazy(true)
                .allow_recurse(true)
                .scheduler(move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.invalidate();
                    }
                });

            ComputedInner {
                target: TargetId::new(),
                dirty: AtomicBool::new(true),
                value: RwLock::new(None),
                effect: Arc::new(EffectInner::new(getter, options, true)),
            }
        });

        Self { inner }
    }

    /// The identity readers of this computed are tracked under.
    pub fn id(&self) -> TargetId {
        self.inner.target
    }

    /// Get the current value, recomputing it first if it is stale.
    ///
    /// Registers the current computation, if any, as a reader. Read from
    /// inside its own getter, a computed returns its previous value.
    ///
    /// # Panics
    ///
    /// Panics if the getter reads its own computed before it has ever
    /// produced a value. Self-referential getters should read through
    /// [`Computed::try_get`] instead.
    pub fn get(&self) -> T {
        self.try_get()
            .expect("computed read its own value before producing one")
    }

    /// Like [`Computed::get`], but returns `None` instead of panicking when
    /// a getter reads its own computed during the first evaluation.
    pub fn try_get(&self) -> Option<T> {
        let inner = &self.inner;
        let evaluating = ReactiveContext::contains(inner.effect.core().id());

        if !evaluating {
            if inner.dirty.load(Ordering::Acquire) {
                if let Some(value) = inner.effect.run() {
                    *inner.value.write() = Some(value);
                }
                inner.dirty.store(false, Ordering::Release);
            }
            Runtime::track(inner.target, TrackKey::Value);
        }

        inner.value.read().clone()
    }

    /// Whether the next read will run the getter.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    /// The effect wrapping the getter.
    pub fn effect(&self) -> EffectHandle {
        EffectHandle::new(Arc::clone(&self.inner.effect) as Arc<dyn Computation>)
    }
}

/// Create a computed value. Shorthand for [`Computed::new`].
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(getter)
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.target)
            .field("dirty", &self.is_dirty())
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect;
    use std::sync::atomic::AtomicI32;

    /// A hand-rolled observable number.
    #[derive(Clone)]
    struct Source {
        id: TargetId,
        value: Arc<AtomicI32>,
    }

    impl Source {
        fn new(value: i32) -> Self {
            Self {
                id: TargetId::new(),
                value: Arc::new(AtomicI32::new(value)),
            }
        }

        fn get(&self) -> i32 {
            Runtime::track(self.id, TrackKey::Value);
            self.value.load(Ordering::SeqCst)
        }

        fn set(&self, value: i32) {
            self.value.store(value, Ordering::SeqCst);
            Runtime::trigger(self.id, &TrackKey::Value);
        }
    }

    fn counted(source: &Source) -> (Computed<i32>, Arc<AtomicI32>) {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let source = source.clone();
        let computed = computed(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            source.get() + 1
        });
        (computed, calls)
    }

    #[test]
    fn computed_is_lazy_and_cached() {
        let source = Source::new(0);
        let (plus_one, calls) = counted(&source);

        // Nothing evaluated before the first read
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(plus_one.is_dirty());

        assert_eq!(plus_one.get(), 1);
        assert_eq!(plus_one.get(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!plus_one.is_dirty());
    }

    #[test]
    fn computed_recomputes_once_per_invalidation() {
        let source = Source::new(0);
        let (plus_one, calls) = counted(&source);
        plus_one.get();

        source.set(1);
        // Invalidated but not recomputed yet
        assert!(plus_one.is_dirty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(plus_one.get(), 2);
        assert_eq!(plus_one.get(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn effects_reading_a_computed_rerun_on_upstream_change() {
        let source = Source::new(1);
        let (plus_one, calls) = counted(&source);

        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();
        let reader = plus_one.clone();
        let runner = effect(move || seen_clone.store(reader.get(), Ordering::SeqCst));

        assert_eq!(seen.load(Ordering::SeqCst), 2);

        source.set(5);
        assert_eq!(seen.load(Ordering::SeqCst), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The computed's effect is not a child of its first reader
        assert_eq!(runner.effect().child_count(), 0);
        assert_eq!(plus_one.effect().depth(), 0);
    }

    #[test]
    fn computeds_chain() {
        let source = Source::new(2);
        let (plus_one, _) = counted(&source);
        let doubled = {
            let plus_one = plus_one.clone();
            computed(move || plus_one.get() * 2)
        };

        assert_eq!(doubled.get(), 6);
        source.set(3);
        assert!(doubled.is_dirty());
        assert_eq!(doubled.get(), 8);
    }

    #[test]
    fn self_read_returns_the_previous_value() {
        let source = Source::new(1);
        let slot: Arc<RwLock<Option<Computed<i32>>>> = Arc::new(RwLock::new(None));

        let slot_clone = slot.clone();
        let source_clone = source.clone();
        let running_total = computed(move || {
            let previous = slot_clone
                .read()
                .as_ref()
                .map(|c| c.get())
                .unwrap_or(0);
            previous + source_clone.get()
        });

        assert_eq!(running_total.get(), 1);

        *slot.write() = Some(running_total.clone());
        source.set(10);
        assert_eq!(running_total.get(), 11);

        // Break the cycle through the slot
        slot.write().take();
    }

    #[test]
    fn self_read_during_the_first_evaluation_is_none() {
        let source = Source::new(1);
        let slot: Arc<RwLock<Option<Computed<i32>>>> = Arc::new(RwLock::new(None));

        let slot_clone = slot.clone();
        let source_clone = source.clone();
        let running_total = computed(move || {
            let previous = slot_clone
                .read()
                .as_ref()
                .and_then(|c| c.try_get())
                .unwrap_or(0);
            previous + source_clone.get()
        });
        *slot.write() = Some(running_total.clone());

        assert_eq!(running_total.try_get(), Some(1));
        source.set(2);
        assert_eq!(running_total.get(), 3);

        slot.write().take();
    }

    #[test]
    fn dropping_the_computed_stops_its_effect() {
        let source = Source::new(0);
        let (plus_one, calls) = counted(&source);
        plus_one.get();

        let handle = plus_one.effect();
        let id = plus_one.id();
        drop(plus_one);

        assert!(!handle.is_active());
        assert!(!Runtime::is_tracked(id));
        assert_eq!(Runtime::dependent_count(source.id, &TrackKey::Value), 0);

        source.set(1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
