//! Integration Tests for Reactive System
//!
//! These tests verify that signals, memos, effects, the scheduler and the
//! host bindings work together correctly.

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use segnale_core::binding::{LifecycleEffect, SignalBinding};
use segnale_core::{BoxError, ReactiveError, Runtime};
use serde_json::json;

fn counter() -> (Rc<Cell<u32>>, impl Fn() + Clone) {
    let count = Rc::new(Cell::new(0));
    let count_clone = count.clone();
    (count, move || count_clone.set(count_clone.get() + 1))
}

// ============================================================================
// Signals and listeners
// ============================================================================

/// Two distinct writes notify twice; repeating the last value notifies nobody.
#[test]
fn listeners_fire_once_per_change() {
    let runtime = Runtime::new();
    let signal = runtime.create_signal(0);
    let (calls, bump) = counter();
    let _sub = signal.subscribe(bump);

    signal.set(1);
    signal.set(2);
    assert_eq!(calls.get(), 2);

    signal.set(2);
    assert_eq!(calls.get(), 2);
}

/// An unsubscribed listener never fires again while others keep firing.
#[test]
fn unsubscribe_is_per_entry() {
    let runtime = Runtime::new();
    let signal = runtime.create_signal("a");
    let (first, bump_first) = counter();
    let (second, bump_second) = counter();

    let sub = signal.subscribe(bump_first.clone());
    let _dup = signal.subscribe(bump_first);
    let _other = signal.subscribe(bump_second);

    sub.unsubscribe();
    signal.set("b");

    // The duplicate registration is an independent entry.
    assert_eq!(first.get(), 1);
    assert_eq!(second.get(), 1);
}

// ============================================================================
// Effects and scheduling
// ============================================================================

/// An effect runs once at flush time and sees the value current at that time.
#[test]
fn effect_runs_once_with_flush_time_value() {
    let runtime = Runtime::new();
    let signal = runtime.create_signal(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let signal_clone = signal.clone();
    let seen_clone = seen.clone();
    runtime.create_effect(move || seen_clone.borrow_mut().push(signal_clone.get()));

    for value in 1..=5 {
        signal.set(value);
    }
    assert!(seen.borrow().is_empty());

    runtime.run_microtasks();
    assert_eq!(*seen.borrow(), vec![5]);

    // N writes between flushes coalesce into one execution.
    signal.set(6);
    signal.set(7);
    signal.set(8);
    runtime.run_microtasks();
    assert_eq!(*seen.borrow(), vec![5, 8]);
}

/// Switching a branch drops the stale dependency.
#[test]
fn effect_switches_dependencies() {
    let runtime = Runtime::new();
    let use_a = runtime.create_signal(true);
    let a = runtime.create_signal(1);
    let b = runtime.create_signal(2);
    let (runs, bump) = counter();

    let (use_a_clone, a_clone, b_clone) = (use_a.clone(), a.clone(), b.clone());
    runtime.create_effect(move || {
        if use_a_clone.get() {
            a_clone.get();
        } else {
            b_clone.get();
        }
        bump();
    });
    runtime.run_microtasks();
    assert_eq!(a.subscriber_count(), 1);
    assert_eq!(b.subscriber_count(), 0);

    use_a.set(false);
    runtime.run_microtasks();
    assert_eq!(runs.get(), 2);
    assert_eq!(a.subscriber_count(), 0);
    assert_eq!(b.subscriber_count(), 1);

    // Writing A no longer re-runs the effect; writing B does.
    a.set(10);
    runtime.run_microtasks();
    assert_eq!(runs.get(), 2);
    b.set(20);
    runtime.run_microtasks();
    assert_eq!(runs.get(), 3);
}

/// Two writes inside `run_in_batch` produce exactly one effect execution.
#[test]
fn run_in_batch_coalesces_writes() {
    let runtime = Runtime::new();
    let first = runtime.create_signal(String::from("Ada"));
    let last = runtime.create_signal(String::from("Lovelace"));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (first_clone, last_clone, seen_clone) = (first.clone(), last.clone(), seen.clone());
    runtime.create_effect(move || {
        let name = format!("{} {}", first_clone.get(), last_clone.get());
        seen_clone.borrow_mut().push(name);
    });
    runtime.run_microtasks();

    runtime.run_in_batch(|| {
        first.set(String::from("Grace"));
        last.set(String::from("Hopper"));
    });
    runtime.run_microtasks();

    assert_eq!(*seen.borrow(), vec!["Ada Lovelace", "Grace Hopper"]);
}

/// A custom batch wrapper sees every flush and every batch.
#[test]
fn custom_batch_wrapper_is_invoked() {
    let (wraps, bump) = counter();
    let runtime = Runtime::builder()
        .batch_updates(move |callback| {
            bump();
            callback();
        })
        .build();
    let signal = runtime.create_signal(0);
    let (runs, bump_run) = counter();

    let signal_clone = signal.clone();
    runtime.create_effect(move || {
        signal_clone.get();
        bump_run();
    });
    runtime.run_microtasks();
    assert_eq!(wraps.get(), 1);

    signal.set(1);
    runtime.run_microtasks();
    assert_eq!(wraps.get(), 2);

    runtime.run_in_batch(|| {
        signal.set(2);
        signal.set(3);
    });
    runtime.run_microtasks();
    assert_eq!(wraps.get(), 4);
    assert_eq!(runs.get(), 3);
}

/// Computations dirtied during a flush run in the following flush.
#[test]
fn flush_works_on_a_snapshot() {
    let runtime = Runtime::new();
    let source = runtime.create_signal(0);
    let derived = runtime.create_signal(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (source_clone, derived_clone) = (source.clone(), derived.clone());
    runtime.create_effect(move || derived_clone.set(source_clone.get() + 1));

    let (derived_clone, seen_clone) = (derived.clone(), seen.clone());
    runtime.create_effect(move || seen_clone.borrow_mut().push(derived_clone.get()));

    // Both effects are in the first snapshot.
    assert_eq!(runtime.run_microtasks(), 1);
    assert_eq!(*seen.borrow(), vec![1]);

    // The writer's change to `derived` lands in a second flush.
    source.set(5);
    assert_eq!(runtime.run_microtasks(), 2);
    assert_eq!(*seen.borrow(), vec![1, 6]);
}

/// A panicking effect does not strand the rest of its flush.
#[test]
fn panic_in_effect_requeues_remaining_work() {
    let runtime = Runtime::new();
    let signal = runtime.create_signal(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let signal_clone = signal.clone();
    runtime.create_effect(move || {
        if signal_clone.get() == 1 {
            panic!("bad value");
        }
    });
    let (signal_clone, seen_clone) = (signal.clone(), seen.clone());
    runtime.create_effect(move || seen_clone.borrow_mut().push(signal_clone.get()));
    runtime.run_microtasks();

    signal.set(1);
    let result = catch_unwind(AssertUnwindSafe(|| runtime.run_microtasks()));
    assert!(result.is_err());
    assert_eq!(runtime.current_computation(), None);
    assert_eq!(runtime.pending_count(), 1);

    runtime.run_microtasks();
    assert_eq!(*seen.borrow(), vec![0, 1]);

    // The panicking effect kept its dependency and recovers on the next write.
    signal.set(2);
    runtime.run_microtasks();
    assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    assert_eq!(signal.subscriber_count(), 2);
}

// ============================================================================
// Memos
// ============================================================================

/// A memo runs nothing until it is read.
#[test]
fn memo_is_lazy() {
    let runtime = Runtime::new();
    let signal = runtime.create_signal(3);
    let (calls, bump) = counter();

    let signal_clone = signal.clone();
    let squared = runtime.create_memo(move || {
        bump();
        signal_clone.get() * signal_clone.get()
    });
    runtime.run_microtasks();
    assert_eq!(calls.get(), 0);

    assert_eq!(squared.get(), 9);
    assert_eq!(squared.get(), 9);
    assert_eq!(calls.get(), 1);
}

/// Reading a memo does not subscribe the reader to the memo's sources.
#[test]
fn memo_reads_are_not_tracked_by_caller() {
    let runtime = Runtime::new();
    let signal = runtime.create_signal(1);
    let (runs, bump) = counter();

    let signal_clone = signal.clone();
    let doubled = runtime.create_memo(move || signal_clone.get() * 2);

    let doubled_clone = doubled.clone();
    let id = runtime.create_effect(move || {
        doubled_clone.get();
        bump();
    });
    runtime.run_microtasks();
    assert_eq!(runs.get(), 1);
    assert_eq!(signal.subscriber_count(), 1);

    // The effect read nothing directly, so it was freed after its run.
    assert!(!runtime.is_dirty(id));
    assert_eq!(runtime.computation_count(), 1);

    signal.set(2);
    runtime.run_microtasks();
    assert_eq!(runs.get(), 1);
    assert_eq!(doubled.get(), 4);
}

/// Memos can be read from other memos.
#[test]
fn memo_chain_recomputes_on_demand() {
    let runtime = Runtime::new();
    let base = runtime.create_signal(2);

    let base_clone = base.clone();
    let doubled = runtime.create_memo(move || base_clone.get() * 2);
    let doubled_clone = doubled.clone();
    let plus_one = runtime.create_memo(move || doubled_clone.get() + 1);

    assert_eq!(plus_one.get(), 5);
    base.set(10);
    assert_eq!(doubled.get(), 20);
}

// ============================================================================
// Signal trees
// ============================================================================

/// Writing one field does not dirty computations reading another field.
#[test]
fn object_fields_are_independent() {
    let runtime = Runtime::new();
    let state = runtime
        .create_signal_tree(&json!({ "a": 1, "b": { "c": true } }))
        .unwrap();
    let (runs, bump) = counter();

    let c = state.cell("b.c").unwrap().clone();
    let id = runtime.create_effect(move || {
        c.get();
        bump();
    });
    runtime.run_microtasks();

    state.set("a", &2).unwrap();
    assert!(!runtime.is_dirty(id));
    assert_eq!(runtime.run_microtasks(), 0);
    assert_eq!(runs.get(), 1);

    state.set("b.c", &false).unwrap();
    runtime.run_microtasks();
    assert_eq!(runs.get(), 2);
    assert_eq!(state.snapshot_value(), json!({ "a": 2, "b": { "c": false } }));
}

/// Tree lookups report missing paths instead of panicking.
#[test]
fn signal_tree_lookup_errors() {
    let runtime = Runtime::new();
    let state = runtime.create_signal_tree(&json!({ "a": 1 })).unwrap();
    let err = state.cell("a.b").unwrap_err();
    assert!(matches!(err, ReactiveError::MissingPath(_)));
    assert_eq!(err.to_string(), "no signal at path `a.b`");
}

// ============================================================================
// Host bindings
// ============================================================================

/// A binding re-renders on change and stops after drop.
#[test]
fn signal_binding_contract() {
    let runtime = Runtime::new();
    let signal = runtime.create_signal(1);
    let (renders, bump) = counter();

    let binding = SignalBinding::new(&signal, bump);
    signal.set(2);
    assert_eq!(renders.get(), 1);
    assert_eq!(binding.current(), 2);

    drop(binding);
    signal.set(3);
    assert_eq!(renders.get(), 1);
}

/// Unmounting a lifecycle effect stops all future runs.
#[test]
fn lifecycle_effect_unmount() {
    let runtime = Runtime::new();
    let signal = runtime.create_signal(0);
    let (runs, bump) = counter();
    let mut effect = LifecycleEffect::new(&runtime);

    let signal_clone = signal.clone();
    effect.render(vec![1], move || {
        signal_clone.get();
        bump();
    });
    runtime.run_microtasks();
    signal.set(1);
    runtime.run_microtasks();
    assert_eq!(runs.get(), 2);

    effect.unmount();
    signal.set(2);
    runtime.run_microtasks();
    assert_eq!(runs.get(), 2);
}

// ============================================================================
// Async effects
// ============================================================================

/// Reads after an await are tracked.
#[tokio::test]
async fn async_effect_tracks_across_await() {
    let runtime = Runtime::new();
    let query = runtime.create_signal("rust");
    let page = runtime.create_signal(1);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (query_clone, page_clone, seen_clone) = (query.clone(), page.clone(), seen.clone());
    runtime.create_async_effect(move || {
        let (query, page, seen) = (query_clone.clone(), page_clone.clone(), seen_clone.clone());
        async move {
            let query = query.get();
            tokio::time::sleep(Duration::from_millis(1)).await;
            seen.borrow_mut().push((query, page.get()));
            Ok::<(), BoxError>(())
        }
    });

    runtime.settle().await;
    assert_eq!(*seen.borrow(), vec![("rust", 1)]);
    assert_eq!(page.subscriber_count(), 1);

    page.set(2);
    runtime.settle().await;
    assert_eq!(*seen.borrow(), vec![("rust", 1), ("rust", 2)]);
    assert_eq!(runtime.task_count(), 0);
}

/// A continuation of a superseded run no longer records dependencies.
#[tokio::test]
async fn superseded_async_run_stops_tracking() {
    let runtime = Runtime::new();
    let trigger = runtime.create_signal(0);
    let late = runtime.create_signal(0);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let rx = Rc::new(RefCell::new(Some(rx)));

    let (trigger_clone, late_clone) = (trigger.clone(), late.clone());
    runtime.create_async_effect(move || {
        let (trigger, late, rx) = (trigger_clone.clone(), late_clone.clone(), rx.clone());
        async move {
            if trigger.get() == 0 {
                let pending = rx.borrow_mut().take();
                if let Some(pending) = pending {
                    pending.await?;
                }
                late.get();
            }
            Ok::<(), BoxError>(())
        }
    });

    assert!(!runtime.run_until_stalled());
    trigger.set(1);
    assert!(!runtime.run_until_stalled());

    tx.send(()).unwrap();
    runtime.settle().await;
    assert_eq!(late.subscriber_count(), 0);
    assert_eq!(trigger.subscriber_count(), 1);
}

/// Failing async effects reach the error hook and nothing else breaks.
#[tokio::test]
async fn async_effect_errors_reach_hook() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let errors_clone = errors.clone();
    let runtime = Runtime::builder()
        .label("errors")
        .on_error(move |err| errors_clone.borrow_mut().push(err.to_string()))
        .build();
    let signal = runtime.create_signal(0);
    let (runs, bump) = counter();

    let signal_clone = signal.clone();
    runtime.create_async_effect(move || {
        let value = signal_clone.get();
        async move {
            if value > 0 {
                return Err::<(), BoxError>(format!("value {value} rejected").into());
            }
            Ok(())
        }
    });
    let signal_clone = signal.clone();
    runtime.create_effect(move || {
        signal_clone.get();
        bump();
    });

    runtime.settle().await;
    signal.set(1);
    runtime.settle().await;

    assert_eq!(errors.borrow().len(), 1);
    assert!(errors.borrow()[0].contains("value 1 rejected"));
    assert_eq!(runs.get(), 2);
}

// ============================================================================
// Runtime ownership
// ============================================================================

/// Independent runtimes share no state.
#[test]
fn runtimes_are_isolated() {
    let left = Runtime::new();
    let right = Runtime::new();
    let signal = left.create_signal(0);
    let (runs, bump) = counter();

    let signal_clone = signal.clone();
    left.create_effect(move || {
        signal_clone.get();
        bump();
    });

    assert_eq!(right.run_microtasks(), 0);
    assert_eq!(runs.get(), 0);
    assert_eq!(left.run_microtasks(), 1);
    assert_eq!(runs.get(), 1);
    assert_eq!(right.cell_count(), 0);
    assert_eq!(right.computation_count(), 0);
}

/// Dropping the runtime frees effect closures and their captures.
#[test]
fn dropping_runtime_frees_graph() {
    let runtime = Runtime::new();
    let signal = runtime.create_signal(0);
    let marker = Rc::new(());

    let (signal_clone, marker_clone) = (signal.clone(), marker.clone());
    runtime.create_effect(move || {
        let _keep = &marker_clone;
        signal_clone.get();
    });
    runtime.run_microtasks();
    assert_eq!(Rc::strong_count(&marker), 2);

    drop(runtime);
    assert_eq!(Rc::strong_count(&marker), 1);

    // The signal keeps working without reactivity.
    signal.set(4);
    assert_eq!(signal.get(), 4);
    assert_eq!(signal.subscriber_count(), 0);
}

/// An effect whose only dependency was dropped is freed with it.
#[test]
fn effect_is_freed_when_its_signal_drops() {
    let runtime = Runtime::new();
    let holder = Rc::new(RefCell::new(Some(runtime.create_signal(1))));
    let (runs, bump) = counter();

    let holder_clone = holder.clone();
    runtime.create_effect(move || {
        if let Some(signal) = holder_clone.borrow().as_ref() {
            signal.get();
        }
        bump();
    });
    runtime.run_microtasks();
    assert_eq!(runs.get(), 1);
    assert_eq!(runtime.computation_count(), 1);

    let taken = holder.borrow_mut().take();
    drop(taken);
    runtime.run_microtasks();

    assert_eq!(runtime.cell_count(), 0);
    assert_eq!(runtime.computation_count(), 0);
    assert_eq!(Rc::strong_count(&holder), 1);
}

/// An effect that panics before reading anything is still freed.
#[test]
fn panicking_effect_without_reads_is_freed() {
    let runtime = Runtime::new();
    runtime.create_effect(|| panic!("boom"));

    let result = catch_unwind(AssertUnwindSafe(|| runtime.run_microtasks()));
    assert!(result.is_err());
    assert_eq!(runtime.computation_count(), 0);
    assert_eq!(runtime.pending_count(), 0);
    assert_eq!(runtime.current_computation(), None);
}

/// An effect that drops a signal it read keeps tracking what it reads next.
#[test]
fn effect_dropping_its_own_dependency_keeps_later_reads() {
    let runtime = Runtime::new();
    let holder = Rc::new(RefCell::new(Some(runtime.create_signal(1))));
    let other = runtime.create_signal(0);
    let (runs, bump) = counter();

    let (holder_clone, other_clone) = (holder.clone(), other.clone());
    runtime.create_effect(move || {
        let first = holder_clone.borrow_mut().take();
        if let Some(signal) = first {
            signal.get();
        }
        other_clone.get();
        bump();
    });
    runtime.run_microtasks();
    assert_eq!(runtime.computation_count(), 1);
    assert_eq!(other.subscriber_count(), 1);

    other.set(1);
    runtime.run_microtasks();
    assert_eq!(runs.get(), 2);
}
