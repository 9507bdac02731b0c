//! Effect Implementation
//!
//! An Effect is a tracked computation: a function whose reads are recorded
//! as dependencies and which runs again whenever one of them changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless created lazily).
//!
//! 2. Each run pushes the effect onto the thread's context stack, clears
//!    every dependency recorded by the previous run, then executes the body.
//!    Branches not taken this time therefore stop triggering the effect.
//!
//! 3. An effect created while another one is running becomes its child.
//!    Children sit one level deeper, run after their parent in a trigger
//!    batch, are re-run at the end of each parent run, and stop with it.
//!
//! 4. When a dependency changes, the effect re-runs synchronously, or its
//!    scheduler is called instead if one was configured.
//!
//! # Recursion
//!
//! An effect already on the context stack is not entered again, and its own
//! writes do not trigger it, unless it was created with `allow_recurse`.
//! This is what stops an effect that reads and writes the same value from
//! looping forever.
//!
//! # Lifecycle
//!
//! Active, then stopped. Stopping is one-way and idempotent: it drops all
//! dependencies, detaches from the parent and stops every child. A stopped
//! effect can still be invoked by hand; its body runs without tracking.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::runtime::{Computation, Dep};
use super::subscriber::SubscriberId;

/// Decides what happens when an effect is invalidated.
///
/// Receives a handle to the invalidated effect; calling
/// [`EffectHandle::run`] reproduces the default behavior.
pub type Scheduler = Arc<dyn Fn(&EffectHandle) + Send + Sync>;

type StopHook = Arc<dyn Fn() + Send + Sync>;

/// Configuration for a new effect.
#[derive(Clone, Default)]
pub struct EffectOptions {
    scheduler: Option<Scheduler>,
    on_stop: Option<StopHook>,
    allow_recurse: bool,
    lazy: bool,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `scheduler` on invalidation instead of re-running.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&EffectHandle) + Send + Sync + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Call `on_stop` once when the effect is stopped.
    pub fn on_stop<F>(mut self, on_stop: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_stop = Some(Arc::new(on_stop));
        self
    }

    /// Let the effect be triggered by its own writes and re-entered while
    /// it is running.
    pub fn allow_recurse(mut self, allow: bool) -> Self {
        self.allow_recurse = allow;
        self
    }

    /// Skip the initial run.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("scheduler", &self.scheduler.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .field("allow_recurse", &self.allow_recurse)
            .field("lazy", &self.lazy)
            .finish()
    }
}

#[derive(Default)]
struct Links {
    /// Dependency sets this effect is registered in.
    deps: SmallVec<[Weak<Dep>; 4]>,
    children: IndexMap<SubscriberId, Arc<dyn Computation>>,
    parent: Option<Weak<dyn Computation>>,
}

/// Lifecycle state shared by every effect, whatever its result type.
pub(crate) struct EffectCore {
    id: SubscriberId,
    scheduler: Option<Scheduler>,
    on_stop: Option<StopHook>,
    allow_recurse: bool,

    /// Never adopted as a child of the effect that happens to run it.
    standalone: bool,

    active: AtomicBool,
    depth: AtomicUsize,
    run_count: AtomicUsize,
    links: Mutex<Links>,
}

impl EffectCore {
    fn new(options: EffectOptions, standalone: bool) -> Self {
        Self {
            id: SubscriberId::new(),
            scheduler: options.scheduler,
            on_stop: options.on_stop,
            allow_recurse: options.allow_recurse,
            standalone,
            active: AtomicBool::new(true),
            depth: AtomicUsize::new(0),
            run_count: AtomicUsize::new(0),
            links: Mutex::new(Links::default()),
        }
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub(crate) fn allows_recursion(&self) -> bool {
        self.allow_recurse
    }

    pub(crate) fn scheduler(&self) -> Option<&Scheduler> {
        self.scheduler.as_ref()
    }

    pub(crate) fn record_dep(&self, dep: &Arc<Dep>) {
        self.links.lock().deps.push(Arc::downgrade(dep));
    }

    /// Remove this effect from every dependency set it is registered in.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut self.links.lock().deps);
        for dep in deps.iter().filter_map(Weak::upgrade) {
            dep.remove(self.id);
        }
    }

    fn attach(&self, parent: Option<Arc<dyn Computation>>, this: &Arc<dyn Computation>) {
        match parent {
            Some(parent) if parent.subscriber_id() != self.id && !self.standalone => {
                parent.core().adopt(Arc::clone(this));
                self.depth.store(parent.core().depth() + 1, Ordering::Relaxed);
                self.links.lock().parent = Some(Arc::downgrade(&parent));
            }
            _ => self.depth.store(0, Ordering::Relaxed),
        }
    }

    fn adopt(&self, child: Arc<dyn Computation>) {
        self.links
            .lock()
            .children
            .entry(child.subscriber_id())
            .or_insert(child);
    }

    fn disown(&self, child: SubscriberId) {
        let removed = self.links.lock().children.shift_remove(&child);
        drop(removed);
    }

    fn children(&self) -> Vec<Arc<dyn Computation>> {
        self.links.lock().children.values().cloned().collect()
    }

    pub(crate) fn stop(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }

        self.cleanup();

        let (parent, children) = {
            let mut links = self.links.lock();
            let children: Vec<_> = links.children.drain(..).map(|(_, child)| child).collect();
            (links.parent.take(), children)
        };

        if let Some(parent) = parent.and_then(|parent| parent.upgrade()) {
            parent.core().disown(self.id);
        }
        for child in children {
            child.core().stop();
        }

        debug!(effect = %self.id, "effect stopped");

        if let Some(on_stop) = &self.on_stop {
            on_stop();
        }
    }

    fn dependency_count(&self) -> usize {
        self.links
            .lock()
            .deps
            .iter()
            .filter(|dep| dep.strong_count() > 0)
            .count()
    }

    fn child_count(&self) -> usize {
        self.links.lock().children.len()
    }

    fn run_count(&self) -> usize {
        self.run_count.load(Ordering::Relaxed)
    }
}

/// An effect together with its body.
pub(crate) struct EffectInner<T> {
    core: EffectCore,
    body: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> EffectInner<T> {
    pub(crate) fn core(&self) -> &EffectCore {
        &self.core
    }
}

impl<T: 'static> EffectInner<T> {
    pub(crate) fn new<F>(body: F, options: EffectOptions, standalone: bool) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            core: EffectCore::new(options, standalone),
            body: Box::new(body),
        }
    }

    /// Execute the body, collecting dependencies if the effect is active.
    ///
    /// Returns `None` when the recursion guard skips the run.
    pub(crate) fn run(self: &Arc<Self>) -> Option<T> {
        let core = &self.core;

        if !core.is_active() {
            return Some((self.body)());
        }

        if ReactiveContext::contains(core.id) && !core.allow_recurse {
            debug!(effect = %core.id, "skipping re-entrant run");
            return None;
        }

        let this: Arc<dyn Computation> = Arc::clone(self) as Arc<dyn Computation>;
        let parent = ReactiveContext::current();
        let _ctx = ReactiveContext::enter(Arc::clone(&this));

        core.attach(parent, &this);
        core.cleanup();
        core.run_count.fetch_add(1, Ordering::Relaxed);
        trace!(effect = %core.id, depth = core.depth(), "running effect");

        let result = (self.body)();

        for child in core.children() {
            if child.core().is_active() {
                child.rerun();
            }
        }

        Some(result)
    }
}

impl<T: 'static> Computation for EffectInner<T> {
    fn subscriber_id(&self) -> SubscriberId {
        self.core.id
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn rerun(self: Arc<Self>) {
        let _ = self.run();
    }
}

/// Type-erased handle to a tracked computation.
///
/// Passed to schedulers, and returned by [`EffectRunner::effect`].
#[derive(Clone)]
pub struct EffectHandle {
    computation: Arc<dyn Computation>,
}

impl EffectHandle {
    pub(crate) fn new(computation: Arc<dyn Computation>) -> Self {
        Self { computation }
    }

    pub fn id(&self) -> SubscriberId {
        self.computation.subscriber_id()
    }

    /// Run the computation now, discarding its result.
    pub fn run(&self) {
        Arc::clone(&self.computation).rerun();
    }

    /// Stop the computation and all of its descendants.
    pub fn stop(&self) {
        self.computation.core().stop();
    }

    pub fn is_active(&self) -> bool {
        self.computation.core().is_active()
    }

    /// Nesting depth as of the last run: 0 for top-level computations.
    pub fn depth(&self) -> usize {
        self.computation.core().depth()
    }

    /// Number of dependency sets the computation is registered in.
    pub fn dependency_count(&self) -> usize {
        self.computation.core().dependency_count()
    }

    pub fn child_count(&self) -> usize {
        self.computation.core().child_count()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.computation.core().run_count()
    }
}

impl PartialEq for EffectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for EffectHandle {}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("depth", &self.depth())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// The callable returned by [`effect`].
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Target::from_json(json!({ "count": 0 }))?);
///
/// let runner = effect({
///     let state = state.clone();
///     move || println!("count is {:?}", state.get("count"))
/// });
///
/// state.set("count", 5); // prints "count is Some(Number(5.0))"
/// runner.stop();
/// ```
pub struct EffectRunner<T> {
    inner: Arc<EffectInner<T>>,
}

impl<T: 'static> EffectRunner<T> {
    /// Invoke the body again and return its result.
    ///
    /// Returns `None` if the effect is already running on this thread and
    /// does not allow recursion.
    pub fn run(&self) -> Option<T> {
        self.inner.run()
    }

    /// The underlying computation.
    pub fn effect(&self) -> EffectHandle {
        EffectHandle::new(Arc::clone(&self.inner) as Arc<dyn Computation>)
    }

    /// Shorthand for `self.effect().stop()`.
    pub fn stop(&self) {
        self.inner.core.stop();
    }

    pub fn is_active(&self) -> bool {
        self.inner.core.is_active()
    }
}

impl<T> Clone for EffectRunner<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for EffectRunner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRunner")
            .field("id", &self.inner.core.id)
            .field("active", &self.inner.core.is_active())
            .field("run_count", &self.inner.core.run_count())
            .finish()
    }
}

/// Create an effect and run it once.
pub fn effect<T, F>(f: F) -> EffectRunner<T>
where
    F: Fn() -> T + Send + Sync + 'static,
    T: 'static,
{
    effect_with(f, EffectOptions::default())
}

/// Create an effect with explicit options.
pub fn effect_with<T, F>(f: F, options: EffectOptions) -> EffectRunner<T>
where
    F: Fn() -> T + Send + Sync + 'static,
    T: 'static,
{
    let lazy = options.lazy;
    let inner = Arc::new(EffectInner::new(f, options, false));

    // Run immediately to establish dependencies
    if !lazy {
        let _ = inner.run();
    }

    EffectRunner { inner }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
