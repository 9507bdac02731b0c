//! Reaction helpers.
//!
//! Thin conveniences over [`effect`] and [`Computed`] for callers that
//! prefer a signal-style API: a disposer closure instead of a runner, and a
//! derived value that can be subscribed to.

use std::fmt::{self, Debug};

use super::computed::Computed;
use super::effect::{effect, EffectRunner};
use super::signal::Signal;
use super::subscriber::Subscription;

/// Run `f` as an effect. Returns a disposer that stops it.
pub fn create_effect<F>(f: F) -> impl Fn() + Send + Sync + 'static
where
    F: Fn() + Send + Sync + 'static,
{
    let runner = effect(f);
    move || runner.stop()
}

/// A computed value that also pushes changes to subscribers.
///
/// Subscribers are called only when the derived value actually changes.
/// Dropping the handle stops the push side; the value is still readable
/// through any clone of [`ComputedSignal::computed`].
pub struct ComputedSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    computed: Computed<T>,
    signal: Signal<T>,
    sync: EffectRunner<()>,
}

impl<T> ComputedSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Read the current derived value. Tracked like any computed read.
    pub fn get(&self) -> T {
        self.computed.get()
    }

    /// Register a callback invoked with each new derived value.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.signal.subscribe(callback)
    }

    pub fn computed(&self) -> &Computed<T> {
        &self.computed
    }
}

impl<T> Drop for ComputedSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.sync.stop();
    }
}

impl<T> Debug for ComputedSignal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedSignal")
            .field("computed", &self.computed)
            .field("subscriber_count", &self.signal.subscriber_count())
            .finish()
    }
}

/// Create a subscribable computed value.
pub fn create_computed<T, F>(getter: F) -> ComputedSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    let computed = Computed::new(getter);
    let signal = Signal::new(computed.get());

    let sync = {
        let computed = computed.clone();
        let signal = signal.clone();
        effect(move || {
            signal.set(computed.get());
        })
    };

    ComputedSignal {
        computed,
        signal,
        sync,
    }
}
