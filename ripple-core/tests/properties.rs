//! Property-Based Tests for Propagation
//!
//! ## Properties Verified
//!
//! - A diamond never observes a torn pair of values
//! - A diamond recomputes exactly once per accepted root change
//! - A fan-in over many stores always matches the sum of its inputs
//! - Start and stop hooks stay balanced under arbitrary subscription churn

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use ripple_core::reactive::{ReadStore, Setter, Store, StoreOptions, Subscription, Teardown};

/// Number of values that differ from the one before, starting from `initial`.
fn accepted_changes(initial: i32, sets: &[i32]) -> usize {
    let mut current = initial;
    let mut changes = 0;
    for &value in sets {
        if value != current {
            changes += 1;
            current = value;
        }
    }
    changes
}

proptest! {
    /// Property: every value seen by a diamond join is consistent with one root value
    #[test]
    fn prop_diamond_is_glitch_free(sets in prop::collection::vec(-50i32..50, 0..40)) {
        let root = Store::new(0);
        let doubled = ReadStore::derived(root.clone(), |n: &i32| n * 2);
        let shifted = ReadStore::derived(root.clone(), |n: &i32| n + 100);

        let calls = Rc::new(Cell::new(0usize));
        let counter = calls.clone();
        let pair = ReadStore::derived((doubled, shifted), move |&(d, s): &(i32, i32)| {
            counter.set(counter.get() + 1);
            (d, s)
        });

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = pair.subscribe(move |value: &(i32, i32)| sink.borrow_mut().push(*value));

        for &value in &sets {
            root.set(value);
        }

        for &(d, s) in seen.borrow().iter() {
            prop_assert_eq!(d / 2 + 100, s, "torn diamond values");
        }

        let expected = 1 + accepted_changes(0, &sets);
        prop_assert_eq!(calls.get(), expected);
        prop_assert_eq!(seen.borrow().len(), expected);
    }

    /// Property: a fan-in derived store tracks the sum of its inputs
    #[test]
    fn prop_fan_in_matches_inputs(
        width in 1usize..12,
        updates in prop::collection::vec((0usize..12, -20i32..20), 0..60)
    ) {
        let stores: Vec<Store<i32>> = (0..width).map(|_| Store::new(0)).collect();
        let total = ReadStore::derived(stores.clone(), |values: &Vec<i32>| values.iter().sum::<i32>());

        let last = Rc::new(Cell::new(i32::MIN));
        let sink = last.clone();
        let _subscription = total.subscribe(move |sum| sink.set(*sum));

        for (index, value) in updates {
            stores[index % width].set(value);
            let expected: i32 = stores.iter().map(Store::get).sum();
            prop_assert_eq!(last.get(), expected);
        }
    }

    /// Property: start and stop hooks stay balanced under subscription churn
    #[test]
    fn prop_lifecycle_balanced(ops in prop::collection::vec(any::<bool>(), 0..50)) {
        let starts = Rc::new(Cell::new(0u32));
        let stops = Rc::new(Cell::new(0u32));
        let (on_start, on_stop) = (starts.clone(), stops.clone());

        let store = Store::with_options(
            0,
            StoreOptions::default().on_start(move |_setter: &Setter<i32>| {
                on_start.set(on_start.get() + 1);
                let on_stop = on_stop.clone();
                let teardown: Teardown = Box::new(move || on_stop.set(on_stop.get() + 1));
                Some(teardown)
            }),
        );

        let mut subscriptions: Vec<Subscription> = Vec::new();
        for subscribe in ops {
            if subscribe {
                subscriptions.push(store.subscribe(|_| {}));
            } else if !subscriptions.is_empty() {
                subscriptions.remove(0);
            }

            let active = !subscriptions.is_empty();
            prop_assert_eq!(store.is_active(), active);
            prop_assert_eq!(store.subscriber_count(), subscriptions.len());
            prop_assert_eq!(starts.get() - stops.get(), u32::from(active));
        }
    }
}
