//! Update Scheduler
//!
//! The scheduler determines the order in which invalidated computations
//! run, and optionally defers them.
//!
//! # Algorithm
//!
//! 1. A write snapshots the dependency set of the key it changed.
//! 2. The snapshot is sorted by nesting depth, parents first. The sort is
//!    stable, so computations at the same depth keep registration order.
//! 3. Each computation either runs or is handed to its scheduler.
//!
//! A [`JobQueue`] is one such scheduler: it collects invalidated
//! computations and runs them together on [`JobQueue::flush`]. Jobs queued
//! while flushing are picked up by a further pass, up to
//! [`MAX_FLUSH_PASSES`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::reactive::{EffectHandle, Scheduler, SubscriberId};

/// Passes a single flush may make before giving up on a queue that keeps
/// refilling itself.
pub const MAX_FLUSH_PASSES: usize = 100;

/// Stable sort by ascending nesting depth.
pub(crate) fn order_by_depth<T>(items: &mut [T], depth: impl Fn(&T) -> usize) {
    items.sort_by_key(|item| depth(item));
}

/// A deduplicating queue of invalidated computations.
///
/// # Example
///
/// ```rust,ignore
/// let queue = JobQueue::new();
/// let enqueue = queue.scheduler();
/// let runner = effect_with(body, EffectOptions::new().scheduler(move |job| enqueue(job)));
///
/// state.set("a", 1);
/// state.set("b", 2);
/// assert_eq!(queue.len(), 1);
///
/// queue.flush(); // runs the effect once
/// ```
#[derive(Clone, Default)]
pub struct JobQueue {
    jobs: Arc<Mutex<IndexMap<SubscriberId, EffectHandle>>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler that enqueues into this queue.
    pub fn scheduler(&self) -> Scheduler {
        let queue = self.clone();
        Arc::new(move |job: &EffectHandle| {
            queue.enqueue(job.clone());
        })
    }

    /// Add a job. Returns `false` if it was already queued.
    pub fn enqueue(&self, job: EffectHandle) -> bool {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&job.id()) {
            return false;
        }
        jobs.insert(job.id(), job);
        true
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Run every queued job that is still active, parents first.
    ///
    /// Returns the number of jobs run.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        let mut pass = 0;

        loop {
            let mut jobs: Vec<EffectHandle> =
                self.jobs.lock().drain(..).map(|(_, job)| job).collect();
            if jobs.is_empty() {
                break;
            }
            if pass == MAX_FLUSH_PASSES {
                warn!(pending = jobs.len(), "job queue did not settle, dropping pending jobs");
                break;
            }

            order_by_depth(&mut jobs, EffectHandle::depth);
            for job in jobs {
                if job.is_active() {
                    job.run();
                    ran += 1;
                }
            }
            pass += 1;
        }

        debug!(ran, passes = pass, "job queue flushed");
        ran
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue").field("len", &self.len()).finish()
    }
}
