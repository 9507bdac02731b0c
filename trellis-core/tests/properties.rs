//! Property-based invariant tests for the reactive system.
//!
//! 1. A signal notifies exactly once per value change
//! 2. Wrapping is cached per target and reversible
//! 3. The dependency store matches the branch an effect last took
//! 4. A computed evaluates once per read following an invalidation
//! 5. Each sequence push re-runs a length reader once
//! 6. A model patch notifies at most once

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use trellis_core::{
    computed, create_signal, effect, reactive, to_raw, Model, Reactive, Runtime, Target, TrackKey,
    Value,
};

// ── Helpers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Write(i32),
    Read,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![(0..4i32).prop_map(Op::Write), Just(Op::Read)]
}

fn counter(start: i32) -> Reactive {
    reactive(Target::from_json(json!({ "n": start })).expect("record"))
}

// ═════════════════════════════════════════════════════════════════════
// 1. Signal notifications
// ═════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn signal_notifies_once_per_change(start in 0..4i32, writes in proptest::collection::vec(0..4i32, 0..40)) {
        let signal = create_signal(start);
        let notified = Arc::new(AtomicUsize::new(0));
        let notified_clone = notified.clone();
        let _sub = signal.subscribe(move |_| {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut current = start;
        let mut expected = 0;
        for next in writes {
            let changed = signal.set(next);
            prop_assert_eq!(changed, next != current);
            if changed {
                expected += 1;
                current = next;
            }
        }

        prop_assert_eq!(notified.load(Ordering::SeqCst), expected);
        prop_assert_eq!(signal.get(), current);
    }
}

// ═════════════════════════════════════════════════════════════════════
// 2. Wrapping identity
// ═════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn wrapping_is_cached_and_reversible(fields in proptest::collection::btree_map("[a-z]{1,6}", 0..100i64, 0..8)) {
        let raw = Target::from_json(json!(fields)).expect("record");
        let first = reactive(&raw);
        let second = reactive(&raw);

        prop_assert!(first.ptr_eq(&second));
        prop_assert!(reactive(&first).ptr_eq(&first));
        prop_assert!(first.raw().ptr_eq(&raw));

        let unwrapped = to_raw(&Value::from(first));
        prop_assert!(matches!(unwrapped, Value::Object(ref t) if t.ptr_eq(&raw)));
    }
}

// ═════════════════════════════════════════════════════════════════════
// 3. Dependencies follow the last run
// ═════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn dependencies_match_the_branch_taken(flags in proptest::collection::vec(any::<bool>(), 1..12)) {
        let state = reactive(Target::from_json(json!({ "flag": flags[0], "a": 1, "b": 2 })).expect("record"));

        let reader = state.clone();
        let _runner = effect(move || {
            let flag = reader.get("flag").and_then(|v| v.as_bool()).unwrap_or(false);
            if flag {
                reader.get("a");
            } else {
                reader.get("b");
            }
        });

        for flag in flags {
            state.set("flag", flag);
            let id = state.id();
            prop_assert_eq!(Runtime::dependent_count(id, &TrackKey::from("flag")), 1);
            prop_assert_eq!(Runtime::dependent_count(id, &TrackKey::from("a")), usize::from(flag));
            prop_assert_eq!(Runtime::dependent_count(id, &TrackKey::from("b")), usize::from(!flag));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════
// 4. Computed evaluation count
// ═════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn computed_evaluates_once_per_invalidated_read(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let state = counter(0);
        let calls = Arc::new(AtomicUsize::new(0));

        let reader = state.clone();
        let calls_clone = calls.clone();
        let doubled = computed(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            reader.get("n").and_then(|v| v.as_f64()).unwrap_or(0.0) * 2.0
        });

        let mut current = 0;
        let mut dirty = true;
        let mut expected = 0;
        for op in ops {
            match op {
                Op::Write(n) => {
                    state.set("n", n);
                    if n != current {
                        current = n;
                        dirty = true;
                    }
                }
                Op::Read => {
                    prop_assert_eq!(doubled.get(), f64::from(current) * 2.0);
                    if dirty {
                        expected += 1;
                        dirty = false;
                    }
                }
            }
        }

        prop_assert_eq!(calls.load(Ordering::SeqCst), expected);
        prop_assert_eq!(doubled.is_dirty(), dirty);
    }
}

// ═════════════════════════════════════════════════════════════════════
// 5. Sequence pushes
// ═════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn each_push_reruns_length_readers_once(items in proptest::collection::vec(any::<i32>(), 0..20)) {
        let list = reactive(Target::sequence());
        let runs = Arc::new(AtomicUsize::new(0));

        let reader = list.clone();
        let runs_clone = runs.clone();
        let _runner = effect(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            reader.len();
        });

        for (i, item) in items.iter().enumerate() {
            let len = list.push(*item).expect("sequence");
            prop_assert_eq!(len, i + 1);
        }

        prop_assert_eq!(runs.load(Ordering::SeqCst), items.len() + 1);
        prop_assert_eq!(list.len(), items.len());
    }
}

// ═════════════════════════════════════════════════════════════════════
// 6. Model patches
// ═════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn model_patch_notifies_at_most_once(
        before in proptest::collection::vec(0..3i64, 3),
        after in proptest::collection::vec(0..3i64, 3),
    ) {
        let m = Model::from_serialize(&json!({ "a": before[0], "b": before[1], "c": before[2] }))
            .expect("record");
        let notified = Arc::new(AtomicUsize::new(0));
        let notified_clone = notified.clone();
        let _sub = m.subscribe(move |_| {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        let changed = m
            .patch_with(&json!({ "a": after[0], "b": after[1], "c": after[2] }))
            .expect("record");

        prop_assert_eq!(changed, before != after);
        prop_assert_eq!(notified.load(Ordering::SeqCst), usize::from(before != after));
        prop_assert_eq!(
            serde_json::Value::Object(m.snapshot()),
            json!({ "a": after[0], "b": after[1], "c": after[2] })
        );
    }
}
