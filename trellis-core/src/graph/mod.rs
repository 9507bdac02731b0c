//! Dependency Graph
//!
//! This module holds the vocabulary of the dependency store and the
//! ordering rules used when invalidated computations are run.
//!
//! # Overview
//!
//! The graph is bipartite and only ever implicit:
//!
//! - Observed values are identified by a [`TargetId`]; every property a
//!   computation can read on one is a [`TrackKey`].
//! - Computations (effects, computeds) register against `(target, key)`
//!   pairs in the runtime's store and form a tree among themselves through
//!   nesting.
//!
//! # Design Decisions
//!
//! 1. Dependencies are rebuilt from scratch on every run, so the store only
//!    reflects the branches taken last time.
//!
//! 2. Invalidated computations run in ascending nesting depth. A parent
//!    re-running recreates its children, so running it first avoids doing
//!    work for children about to be replaced.
//!
//! 3. Deferred execution is opt-in through [`JobQueue`], which batches and
//!    deduplicates invalidations until it is flushed.

mod node;
mod scheduler;

pub use node::{ArrayMethod, TargetId, TrackKey};
pub(crate) use scheduler::order_by_depth;
pub use scheduler::{JobQueue, MAX_FLUSH_PASSES};
