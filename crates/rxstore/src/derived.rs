#![forbid(unsafe_code)]

//! Stores computed from one or more other stores.
//!
//! # Design
//!
//! Each combinator builds a [`Readable`] whose producer subscribes to every
//! source, keeps a snapshot of their latest values, and recomputes whenever
//! any source changes. Two families exist per arity:
//!
//! - **Mapping mode** ([`derived`], [`derived2`], [`derived3`]): a pure
//!   function over the source values; the result is pushed through the setter
//!   on every source change, and the initial value is the mapping applied to
//!   the sources' construction-time values.
//! - **Producer mode** ([`derived_with`], [`derived2_with`],
//!   [`derived3_with`]): the function receives the source values and a
//!   [`Setter`], may call it zero or more times (e.g. from asynchronous
//!   work), and may return a [`Cleanup`] that is run before the next
//!   recomputation and on final disposal.
//!
//! Mode and arity are selected by the constructor name; the single-source
//! variants pass the bare source value rather than a one-element tuple.
//!
//! # Invariants
//!
//! 1. The snapshot always reflects the most recently observed value from each
//!    source.
//! 2. Subscribe-time first notifications during construction never trigger
//!    recomputation; exactly one explicit recomputation runs once all sources
//!    are subscribed.
//! 3. A retained cleanup runs before each recomputation, unconditionally,
//!    whether or not the producer goes on to call the setter.
//! 4. Disposing the derived store unsubscribes every source and runs any
//!    outstanding cleanup; no source subscription outlives disposal.
//!
//! # Edge cases
//!
//! - Source callbacks run user code on a clone of the snapshot with no
//!   internal borrow held, so a producer that (re-entrantly) writes a source
//!   recurses rather than panicking. Cycles among derived stores are a caller
//!   error and will recurse until the equality rule terminates them or the
//!   stack overflows.
//! - Panics from the mapping/producer function propagate unmodified to
//!   whoever triggered the recomputation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::observable::Observable;
use crate::readable::{Cleanup, Readable, Setter};

/// Derive a store from a single source with a pure mapping.
///
/// The mapping runs once at construction to produce the initial value, and
/// again synchronously on every source change.
pub fn derived<A, T>(source: &impl Observable<A>, map: impl Fn(&A) -> T + 'static) -> Readable<T>
where
    A: Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    let snapshot = Rc::new(RefCell::new(source.get()));
    let initial = map(&snapshot.borrow());
    let map = Rc::new(map);
    Readable::new(
        move |set, _get| {
            let building = Rc::new(Cell::new(true));
            let recompute = {
                let snapshot = Rc::clone(&snapshot);
                let building = Rc::clone(&building);
                Rc::new(move || {
                    if building.get() {
                        return;
                    }
                    let value = snapshot.borrow().clone();
                    // Disposal unsubscribes the source before recomputation
                    // could fire again, so the guarded set cannot fail here.
                    let _ = set.set(map(&value));
                })
            };
            let sub = source.subscribe(slot_updater(&snapshot, &recompute, |snap, v| *snap = v));
            building.set(false);
            recompute();
            Some(Box::new(move || sub.unsubscribe()) as Cleanup)
        },
        initial,
    )
}

/// Derive a store from two sources with a pure mapping.
pub fn derived2<A, B, T>(
    a: &impl Observable<A>,
    b: &impl Observable<B>,
    map: impl Fn(&A, &B) -> T + 'static,
) -> Readable<T>
where
    A: Clone + 'static,
    B: Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    let snapshot = Rc::new(RefCell::new((a.get(), b.get())));
    let initial = {
        let snap = snapshot.borrow();
        map(&snap.0, &snap.1)
    };
    let map = Rc::new(map);
    Readable::new(
        move |set, _get| {
            let building = Rc::new(Cell::new(true));
            let recompute = {
                let snapshot = Rc::clone(&snapshot);
                let building = Rc::clone(&building);
                Rc::new(move || {
                    if building.get() {
                        return;
                    }
                    let (va, vb) = snapshot.borrow().clone();
                    let _ = set.set(map(&va, &vb));
                })
            };
            let sub_a = a.subscribe(slot_updater(&snapshot, &recompute, |snap, v| snap.0 = v));
            let sub_b = b.subscribe(slot_updater(&snapshot, &recompute, |snap, v| snap.1 = v));
            building.set(false);
            recompute();
            Some(Box::new(move || {
                sub_a.unsubscribe();
                sub_b.unsubscribe();
            }) as Cleanup)
        },
        initial,
    )
}

/// Derive a store from three sources with a pure mapping.
pub fn derived3<A, B, C, T>(
    a: &impl Observable<A>,
    b: &impl Observable<B>,
    c: &impl Observable<C>,
    map: impl Fn(&A, &B, &C) -> T + 'static,
) -> Readable<T>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    let snapshot = Rc::new(RefCell::new((a.get(), b.get(), c.get())));
    let initial = {
        let snap = snapshot.borrow();
        map(&snap.0, &snap.1, &snap.2)
    };
    let map = Rc::new(map);
    Readable::new(
        move |set, _get| {
            let building = Rc::new(Cell::new(true));
            let recompute = {
                let snapshot = Rc::clone(&snapshot);
                let building = Rc::clone(&building);
                Rc::new(move || {
                    if building.get() {
                        return;
                    }
                    let (va, vb, vc) = snapshot.borrow().clone();
                    let _ = set.set(map(&va, &vb, &vc));
                })
            };
            let sub_a = a.subscribe(slot_updater(&snapshot, &recompute, |snap, v| snap.0 = v));
            let sub_b = b.subscribe(slot_updater(&snapshot, &recompute, |snap, v| snap.1 = v));
            let sub_c = c.subscribe(slot_updater(&snapshot, &recompute, |snap, v| snap.2 = v));
            building.set(false);
            recompute();
            Some(Box::new(move || {
                sub_a.unsubscribe();
                sub_b.unsubscribe();
                sub_c.unsubscribe();
            }) as Cleanup)
        },
        initial,
    )
}

/// Derive a store from a single source with a producer function.
///
/// `producer` receives the source value and a guarded [`Setter`]; it may call
/// the setter zero or more times and may return a [`Cleanup`] run before the
/// next recomputation and on disposal. The store starts at `initial`.
pub fn derived_with<A, T>(
    source: &impl Observable<A>,
    producer: impl Fn(&A, &Setter<T>) -> Option<Cleanup> + 'static,
    initial: T,
) -> Readable<T>
where
    A: Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    let snapshot = Rc::new(RefCell::new(source.get()));
    let producer = Rc::new(producer);
    Readable::new(
        move |set, _get| {
            let building = Rc::new(Cell::new(true));
            let retained: Rc<RefCell<Option<Cleanup>>> = Rc::new(RefCell::new(None));
            let recompute = {
                let snapshot = Rc::clone(&snapshot);
                let building = Rc::clone(&building);
                let retained = Rc::clone(&retained);
                Rc::new(move || {
                    if building.get() {
                        return;
                    }
                    run_retained(&retained);
                    let value = snapshot.borrow().clone();
                    let next = producer(&value, &set);
                    *retained.borrow_mut() = next;
                })
            };
            let sub = source.subscribe(slot_updater(&snapshot, &recompute, |snap, v| *snap = v));
            building.set(false);
            recompute();
            let retained = Rc::clone(&retained);
            Some(Box::new(move || {
                sub.unsubscribe();
                run_retained(&retained);
            }) as Cleanup)
        },
        initial,
    )
}

/// Derive a store from two sources with a producer function.
pub fn derived2_with<A, B, T>(
    a: &impl Observable<A>,
    b: &impl Observable<B>,
    producer: impl Fn(&A, &B, &Setter<T>) -> Option<Cleanup> + 'static,
    initial: T,
) -> Readable<T>
where
    A: Clone + 'static,
    B: Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    let snapshot = Rc::new(RefCell::new((a.get(), b.get())));
    let producer = Rc::new(producer);
    Readable::new(
        move |set, _get| {
            let building = Rc::new(Cell::new(true));
            let retained: Rc<RefCell<Option<Cleanup>>> = Rc::new(RefCell::new(None));
            let recompute = {
                let snapshot = Rc::clone(&snapshot);
                let building = Rc::clone(&building);
                let retained = Rc::clone(&retained);
                Rc::new(move || {
                    if building.get() {
                        return;
                    }
                    run_retained(&retained);
                    let (va, vb) = snapshot.borrow().clone();
                    let next = producer(&va, &vb, &set);
                    *retained.borrow_mut() = next;
                })
            };
            let sub_a = a.subscribe(slot_updater(&snapshot, &recompute, |snap, v| snap.0 = v));
            let sub_b = b.subscribe(slot_updater(&snapshot, &recompute, |snap, v| snap.1 = v));
            building.set(false);
            recompute();
            let retained = Rc::clone(&retained);
            Some(Box::new(move || {
                sub_a.unsubscribe();
                sub_b.unsubscribe();
                run_retained(&retained);
            }) as Cleanup)
        },
        initial,
    )
}

/// Derive a store from three sources with a producer function.
pub fn derived3_with<A, B, C, T>(
    a: &impl Observable<A>,
    b: &impl Observable<B>,
    c: &impl Observable<C>,
    producer: impl Fn(&A, &B, &C, &Setter<T>) -> Option<Cleanup> + 'static,
    initial: T,
) -> Readable<T>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    let snapshot = Rc::new(RefCell::new((a.get(), b.get(), c.get())));
    let producer = Rc::new(producer);
    Readable::new(
        move |set, _get| {
            let building = Rc::new(Cell::new(true));
            let retained: Rc<RefCell<Option<Cleanup>>> = Rc::new(RefCell::new(None));
            let recompute = {
                let snapshot = Rc::clone(&snapshot);
                let building = Rc::clone(&building);
                let retained = Rc::clone(&retained);
                Rc::new(move || {
                    if building.get() {
                        return;
                    }
                    run_retained(&retained);
                    let (va, vb, vc) = snapshot.borrow().clone();
                    let next = producer(&va, &vb, &vc, &set);
                    *retained.borrow_mut() = next;
                })
            };
            let sub_a = a.subscribe(slot_updater(&snapshot, &recompute, |snap, v| snap.0 = v));
            let sub_b = b.subscribe(slot_updater(&snapshot, &recompute, |snap, v| snap.1 = v));
            let sub_c = c.subscribe(slot_updater(&snapshot, &recompute, |snap, v| snap.2 = v));
            building.set(false);
            recompute();
            let retained = Rc::clone(&retained);
            Some(Box::new(move || {
                sub_a.unsubscribe();
                sub_b.unsubscribe();
                sub_c.unsubscribe();
                run_retained(&retained);
            }) as Cleanup)
        },
        initial,
    )
}

/// Build a source callback that writes one snapshot slot and triggers a
/// recomputation. The slot write happens before the recompute so invariant 1
/// holds even for the subscribe-time delivery.
fn slot_updater<S, V>(
    snapshot: &Rc<RefCell<S>>,
    recompute: &Rc<impl Fn() + 'static>,
    write: impl Fn(&mut S, V) + 'static,
) -> impl Fn(&V) + 'static
where
    S: 'static,
    V: Clone + 'static,
{
    let snapshot = Rc::clone(snapshot);
    let recompute = Rc::clone(recompute);
    move |value: &V| {
        write(&mut *snapshot.borrow_mut(), value.clone());
        recompute();
    }
}

/// Take and run the retained per-update cleanup, if any.
fn run_retained(retained: &Rc<RefCell<Option<Cleanup>>>) {
    let cleanup = retained.borrow_mut().take();
    if let Some(cleanup) = cleanup {
        cleanup();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writable::Writable;
    use std::cell::Cell;

    #[test]
    fn single_source_mapping() {
        let simple = Writable::new(1);
        let double = derived(&simple, |n| n * 2);
        assert_eq!(double.get(), 2);

        simple.set(21);
        assert_eq!(double.get(), 42);
    }

    #[test]
    fn disposed_derived_ignores_source_changes() {
        let simple = Writable::new(1);
        let double = derived(&simple, |n| n * 2);
        double.dispose().unwrap();

        simple.set(42);
        assert_eq!(double.get(), 2);
    }

    #[test]
    fn dispose_unsubscribes_sources() {
        let simple = Writable::new(1);
        let double = derived(&simple, |n| n * 2);
        assert_eq!(simple.subscriber_count(), 1);

        double.dispose().unwrap();
        assert_eq!(simple.subscriber_count(), 0);
    }

    #[test]
    fn disposed_derived_stops_notifying_its_own_subscribers() {
        let simple = Writable::new(1);
        let double = derived(&simple, |n| n * 2);

        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        let _sub = double.subscribe(move |_| calls_clone.set(calls_clone.get() + 1));
        assert_eq!(calls.get(), 1);

        double.dispose().unwrap();
        simple.set(42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn two_source_mapping() {
        let times = Writable::new(3);
        let text = Writable::new("na".to_string());
        let message = derived2(&times, &text, |x, t| format!("Batman {}", t.repeat(*x)));
        assert_eq!(message.get(), "Batman nanana");

        times.set(5);
        assert_eq!(message.get(), "Batman nanananana");
    }

    #[test]
    fn three_source_mapping() {
        let a = Writable::new(1);
        let b = Writable::new(2);
        let c = Writable::new(3);
        let sum = derived3(&a, &b, &c, |x, y, z| x + y + z);
        assert_eq!(sum.get(), 6);

        b.set(10);
        assert_eq!(sum.get(), 14);
    }

    #[test]
    fn construction_window_suppresses_recomputation() {
        let a = Writable::new(1);
        let b = Writable::new(2);
        let computes = Rc::new(Cell::new(0u32));
        let computes_clone = Rc::clone(&computes);

        let _sum = derived2(&a, &b, move |x, y| {
            computes_clone.set(computes_clone.get() + 1);
            x + y
        });
        // Initial-value computation plus the single explicit recomputation
        // after setup; the two subscribe-time deliveries add nothing.
        assert_eq!(computes.get(), 2);
    }

    #[test]
    fn each_source_change_recomputes_once() {
        let a = Writable::new(1);
        let b = Writable::new(2);
        let computes = Rc::new(Cell::new(0u32));
        let computes_clone = Rc::clone(&computes);

        let sum = derived2(&a, &b, move |x, y| {
            computes_clone.set(computes_clone.get() + 1);
            x + y
        });
        let base = computes.get();

        a.set(5);
        assert_eq!(computes.get(), base + 1);
        b.set(7);
        assert_eq!(computes.get(), base + 2);
        assert_eq!(sum.get(), 12);
    }

    #[test]
    fn chained_derivation() {
        let count = Writable::new(2);
        let double = derived(&count, |n| n * 2);
        let quad = derived(&double, |n| n * 2);
        assert_eq!(quad.get(), 8);

        count.set(3);
        assert_eq!(double.get(), 6);
        assert_eq!(quad.get(), 12);
    }

    #[test]
    fn producer_cleanup_runs_once_per_recomputation() {
        let simple = Writable::new(1);
        let factor = Writable::new(3);
        let cleanups = Rc::new(Cell::new(0u32));
        let cleanups_clone = Rc::clone(&cleanups);

        // Threshold gate: the producer only pushes products above 10, but the
        // cleanup must run once per recomputation regardless.
        let result = derived2_with(
            &simple,
            &factor,
            move |s, f, set| {
                let r = s * f;
                if r > 10 {
                    set.set(r).unwrap();
                }
                let cleanups = Rc::clone(&cleanups_clone);
                Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Cleanup)
            },
            10,
        );
        assert_eq!(result.get(), 10);

        simple.set(3); // Product 9: below the gate, value unchanged.
        assert_eq!(result.get(), 10);

        factor.set(4); // Product 12: above the gate.
        assert_eq!(result.get(), 12);
        assert_eq!(cleanups.get(), 2);
    }

    #[test]
    fn producer_cleanup_runs_before_next_producer_call() {
        let source = Writable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = Rc::clone(&log);

        let _derived = derived_with(
            &source,
            move |v, _set| {
                log_clone.borrow_mut().push(format!("produce {v}"));
                let log = Rc::clone(&log_clone);
                Some(Box::new(move || log.borrow_mut().push("cleanup".to_string())) as Cleanup)
            },
            0,
        );

        source.set(1);
        source.set(2);
        assert_eq!(
            *log.borrow(),
            vec!["produce 0", "cleanup", "produce 1", "cleanup", "produce 2"]
        );
    }

    #[test]
    fn none_clears_retained_cleanup() {
        let source = Writable::new(0);
        let cleanups = Rc::new(Cell::new(0u32));
        let cleanups_clone = Rc::clone(&cleanups);

        // Only the first activation returns a cleanup.
        let derived_store = derived_with(
            &source,
            move |v, _set| {
                if *v == 0 {
                    let cleanups = Rc::clone(&cleanups_clone);
                    Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Cleanup)
                } else {
                    None
                }
            },
            0,
        );

        source.set(1); // Runs the retained cleanup, retains None.
        assert_eq!(cleanups.get(), 1);
        source.set(2); // Nothing retained: no cleanup.
        assert_eq!(cleanups.get(), 1);

        derived_store.dispose().unwrap();
        assert_eq!(cleanups.get(), 1); // Nothing outstanding on dispose.
    }

    #[test]
    fn dispose_runs_outstanding_producer_cleanup() {
        let source = Writable::new(0);
        let cleanups = Rc::new(Cell::new(0u32));
        let cleanups_clone = Rc::clone(&cleanups);

        let derived_store = derived_with(
            &source,
            move |_v, _set| {
                let cleanups = Rc::clone(&cleanups_clone);
                Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Cleanup)
            },
            0,
        );

        derived_store.dispose().unwrap();
        assert_eq!(cleanups.get(), 1);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn producer_mode_single_source_initial_value() {
        let search = Writable::new("boots".to_string());
        // A producer that never calls the setter leaves the initial value.
        let results: Readable<Vec<String>> =
            derived_with(&search, |_query, _set| None, Vec::new());
        assert_eq!(results.get(), Vec::<String>::new());
    }

    #[test]
    fn producer_may_set_many_times() {
        let source = Writable::new(1);
        let latest = derived_with(
            &source,
            |v, set| {
                set.set(*v).unwrap();
                set.set(v * 10).unwrap();
                None
            },
            0,
        );
        assert_eq!(latest.get(), 10);

        source.set(2);
        assert_eq!(latest.get(), 20);
    }

    #[test]
    fn three_source_producer() {
        let a = Writable::new(1);
        let b = Writable::new(2);
        let c = Writable::new(3);
        let gated = derived3_with(
            &a,
            &b,
            &c,
            |x, y, z, set| {
                let sum = x + y + z;
                if sum % 2 == 0 {
                    set.set(sum).unwrap();
                }
                None
            },
            0,
        );
        assert_eq!(gated.get(), 6); // 1+2+3 is even.

        a.set(2); // Sum 7: odd, gate closed.
        assert_eq!(gated.get(), 6);
        c.set(4); // Sum 8: even.
        assert_eq!(gated.get(), 8);
    }

    #[test]
    fn derived_from_readable_source() {
        let clock = Readable::new(
            |set, _get| {
                set.set(10).unwrap();
                None
            },
            0,
        );
        let doubled = derived(&clock, |n| n * 2);
        assert_eq!(doubled.get(), 20);
    }

    #[test]
    fn equality_suppression_propagates_through_derivation() {
        let source = Writable::new(1);
        let parity = derived(&source, |n| n % 2);

        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        let _sub = parity.subscribe(move |_| calls_clone.set(calls_clone.get() + 1));
        assert_eq!(calls.get(), 1);

        source.set(3); // Parity unchanged: no notification.
        assert_eq!(calls.get(), 1);
        source.set(4); // Parity flips.
        assert_eq!(calls.get(), 2);
    }
}
