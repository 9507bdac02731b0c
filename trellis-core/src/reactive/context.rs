//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when an observed value is
//! read, the current computation is registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Running an effect pushes a
//! tracking frame for it; [`untracked`] pushes a paused frame that hides
//! everything below it from dependency collection. Frames are popped by a
//! guard, so the stack is restored on every exit path, including unwinding
//! out of a panicking computation.

use std::cell::RefCell;
use std::sync::Arc;

use super::runtime::Computation;
use super::SubscriberId;

#[derive(Clone)]
enum Frame {
    Tracking(Arc<dyn Computation>),
    Paused,
}

impl Frame {
    fn subscriber_id(&self) -> Option<SubscriberId> {
        match self {
            Self::Tracking(computation) => Some(computation.subscriber_id()),
            Self::Paused => None,
        }
    }
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops its frame when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking frame for `computation`.
    pub(crate) fn enter(computation: Arc<dyn Computation>) -> Self {
        let subscriber_id = computation.subscriber_id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Frame::Tracking(computation)));
        Self {
            subscriber_id: Some(subscriber_id),
        }
    }

    /// Enter a frame in which no dependencies are recorded.
    pub fn pause() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Frame::Paused));
        Self {
            subscriber_id: None,
        }
    }

    /// Check if a computation is currently collecting dependencies.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the subscriber ID of the collecting computation, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(Frame::subscriber_id))
    }

    pub(crate) fn current() -> Option<Arc<dyn Computation>> {
        CONTEXT_STACK.with(|stack| match stack.borrow().last() {
            Some(Frame::Tracking(computation)) => Some(Arc::clone(computation)),
            _ => None,
        })
    }

    /// Whether the computation is anywhere on this thread's stack.
    pub fn contains(subscriber_id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|frame| frame.subscriber_id() == Some(subscriber_id))
        })
    }

    /// Number of frames on this thread's stack.
    pub fn stack_depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(frame) = popped {
            debug_assert_eq!(
                frame.subscriber_id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                frame.subscriber_id()
            );
        }
    }
}

/// Run `f` without recording any dependencies.
///
/// Reads inside `f` register nothing, even when called from inside an
/// effect. The recursion guard still sees the computations below.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::pause();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, EffectRunner};
    use parking_lot::Mutex;

    fn probe() -> (EffectRunner<()>, Arc<Mutex<Vec<Option<SubscriberId>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let runner = effect(move || {
            seen_clone.lock().push(ReactiveContext::current_subscriber());
        });
        (runner, seen)
    }

    #[test]
    fn context_tracks_running_effect() {
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        let (runner, seen) = probe();
        assert_eq!(*seen.lock(), vec![Some(runner.effect().id())]);

        // Context should be cleaned up after the run
        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::stack_depth(), 0);
    }

    #[test]
    fn paused_frame_hides_the_collector() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let runner = effect(move || {
            let inner = untracked(ReactiveContext::current_subscriber);
            seen_clone.lock().push(inner);
            seen_clone.lock().push(ReactiveContext::current_subscriber());
        });

        let id = runner.effect().id();
        assert_eq!(*seen.lock(), vec![None, Some(id)]);
    }

    #[test]
    fn stack_unwinds_after_panic() {
        let result = std::panic::catch_unwind(|| {
            effect(|| panic!("boom"));
        });
        assert!(result.is_err());
        assert_eq!(ReactiveContext::stack_depth(), 0);
        assert!(ReactiveContext::current_subscriber().is_none());
    }
}
