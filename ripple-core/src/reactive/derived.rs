//! Derived Store Implementation
//!
//! A derived store computes its value from one or more input stores.
//!
//! # How Derived Stores Work
//!
//! 1. A derived store is dormant until someone subscribes. Activating it
//!    subscribes to every input; each input replays its value into the
//!    derived store's slots, then the recompute function runs once.
//!
//! 2. When an input is invalidated, its position is marked *pending*. When it
//!    notifies, the new value is stored, the position is cleared from
//!    pending and added to *changed*.
//!
//! 3. The recompute function only runs when nothing is pending. In a diamond
//!    (two inputs sharing an ancestor) both inputs are invalidated before
//!    either notifies, so the derived store recomputes once, with both new
//!    values, instead of once per input.
//!
//! 4. When the last subscriber leaves, the derived store unsubscribes from its
//!    inputs and forgets its per-activation state. Its last value survives.
//!
//! # Recompute Modes
//!
//! - [`Recompute::Simple`]: a pure function of the input values. Its result
//!   is set on the store.
//! - [`Recompute::Manual`]: receives a [`Setter`] and the [`ChangeSet`] and
//!   sets the store itself, possibly later. It may return a cleanup callback,
//!   run before the next recompute and when the store deactivates.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::equal::Equal;
use super::inputs::{InputPort, Inputs};
use super::lifecycle::{Setter, Teardown};
use super::store::{Inner, ReadStore, StoreOptions};
use super::tracker::{ChangeSet, InputMask};
use crate::error::{Result, StoreError};

/// Simple recompute function.
pub type SimpleFn<V, T> = Box<dyn Fn(&V) -> T>;

/// Manual recompute function.
pub type ManualFn<V, K, T> = Box<dyn Fn(&V, &Setter<T>, &ChangeSet<K>) -> Option<Teardown>>;

/// How a derived store turns input values into its own value.
pub enum Recompute<V, K, T> {
    /// Compute the value directly.
    Simple(SimpleFn<V, T>),

    /// Set the value through a setter, optionally returning a cleanup.
    Manual(ManualFn<V, K, T>),
}

impl<V, K, T> Recompute<V, K, T> {
    /// Wrap a pure function of the input values.
    pub fn simple<F>(f: F) -> Self
    where
        F: Fn(&V) -> T + 'static,
    {
        Self::Simple(Box::new(f))
    }

    /// Wrap a function that sets the value itself.
    pub fn manual<F>(f: F) -> Self
    where
        F: Fn(&V, &Setter<T>, &ChangeSet<K>) -> Option<Teardown> + 'static,
    {
        Self::Manual(Box::new(f))
    }
}

impl<V, K, T> fmt::Debug for Recompute<V, K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(_) => f.write_str("Recompute::Simple"),
            Self::Manual(_) => f.write_str("Recompute::Manual"),
        }
    }
}

/// Hook run when a derived store activates, before it subscribes to inputs.
pub type DerivedStartHook = Box<dyn FnMut() -> Option<Teardown>>;

/// Construction options for a derived store.
pub struct DerivedOptions<T> {
    equal: Equal<T>,
    initial: Option<T>,
    start: Option<DerivedStartHook>,
    changed_only: bool,
}

impl<T: 'static> DerivedOptions<T> {
    /// Options with the given equality policy and nothing else.
    pub fn with_equal(equal: Equal<T>) -> Self {
        Self {
            equal,
            initial: None,
            start: None,
            changed_only: false,
        }
    }

    /// Replace the equality policy.
    pub fn equal(mut self, equal: Equal<T>) -> Self {
        self.equal = equal;
        self
    }

    /// Value held before the first recompute.
    pub fn initial(mut self, value: T) -> Self {
        self.initial = Some(value);
        self
    }

    /// Acquire a side resource on activation.
    ///
    /// The returned teardown runs on deactivation, after the inputs are
    /// unsubscribed and the last cleanup has run.
    pub fn on_start<F>(mut self, start: F) -> Self
    where
        F: FnMut() -> Option<Teardown> + 'static,
    {
        self.start = Some(Box::new(start));
        self
    }

    /// Stay silent on the recompute that runs at each activation.
    ///
    /// Every later recompute that changes the value notifies as usual.
    pub fn changed_only(mut self, changed_only: bool) -> Self {
        self.changed_only = changed_only;
        self
    }
}

impl<T: PartialEq + 'static> Default for DerivedOptions<T> {
    fn default() -> Self {
        Self::with_equal(Equal::partial_eq())
    }
}

/// What a derived store keeps between activations.
struct Derivation<I: Inputs, T> {
    inputs: I,
    recompute: Recompute<I::Values, I::Key, T>,
    start: RefCell<Option<DerivedStartHook>>,
}

impl<I: Inputs, T: 'static> Derivation<I, T> {
    /// Connect to the inputs and run the first recompute.
    fn activate(self: &Rc<Self>, setter: &Setter<T>) -> Teardown {
        let hook = self.start.borrow_mut().take();
        let destroy = match hook {
            Some(mut hook) => {
                let destroy = hook();
                *self.start.borrow_mut() = Some(hook);
                destroy
            }
            None => None,
        };

        trace!(inputs = self.inputs.len(), "derived store connecting");
        let sync = Rc::new(SyncState {
            derivation: Rc::clone(self),
            setter: setter.clone(),
            slots: Rc::new(RefCell::new(self.inputs.empty_slots())),
            pending: RefCell::new(InputMask::new()),
            changed: RefCell::new(InputMask::new()),
            inited: Cell::new(false),
            live: Cell::new(true),
            cleanup: RefCell::new(None),
        });

        let port: Rc<dyn InputPort> = Rc::clone(&sync) as Rc<dyn InputPort>;
        let subscriptions = self.inputs.connect(&sync.slots, &port);

        sync.inited.set(true);
        sync.sync();

        // The activation recompute is the first change, even when it kept the value
        setter.mark_changed();

        Box::new(move || {
            // Notify jobs queued before teardown may still reach this state
            sync.live.set(false);
            drop(subscriptions);

            let cleanup = sync.cleanup.borrow_mut().take();
            if let Some(cleanup) = cleanup {
                cleanup();
            }
            if let Some(destroy) = destroy {
                destroy();
            }
        })
    }
}

/// Per-activation dependency state.
struct SyncState<I: Inputs, T> {
    derivation: Rc<Derivation<I, T>>,
    setter: Setter<T>,
    slots: Rc<RefCell<I::Slots>>,
    pending: RefCell<InputMask>,
    changed: RefCell<InputMask>,
    inited: Cell<bool>,
    live: Cell<bool>,
    cleanup: RefCell<Option<Teardown>>,
}

impl<I: Inputs, T: 'static> SyncState<I, T> {
    fn sync(&self) {
        if !self.live.get() {
            return;
        }
        if !self.pending.borrow().is_empty() {
            trace!(pending = ?self.pending.borrow(), "recompute deferred");
            return;
        }

        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }

        let values = self.derivation.inputs.assemble(&self.slots.borrow());
        let Some(values) = values else {
            return;
        };

        // Taken before running so changes arriving during the run are kept
        let changed = self.changed.take();

        match &self.derivation.recompute {
            Recompute::Simple(compute) => {
                let value = compute(&values);
                self.setter.set(value);
            }
            Recompute::Manual(compute) => {
                let inputs = &self.derivation.inputs;
                let changes = ChangeSet::new(changed, |index| inputs.key(index));
                let cleanup = compute(&values, &self.setter, &changes);
                *self.cleanup.borrow_mut() = cleanup;
            }
        }
    }
}

impl<I: Inputs, T: 'static> InputPort for SyncState<I, T> {
    fn invalidated(&self, index: usize) {
        if self.live.get() {
            self.pending.borrow_mut().insert(index);
        }
    }

    fn notified(&self, index: usize) {
        if !self.live.get() {
            trace!(input = index, "notify after teardown ignored");
            return;
        }
        self.pending.borrow_mut().remove(index);
        if self.inited.get() {
            self.changed.borrow_mut().insert(index);
            self.sync();
        }
    }
}

impl<T: PartialEq + 'static> ReadStore<T> {
    /// Derive a store with a pure function of the input values.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ripple_core::{ReadStore, Store};
    ///
    /// let width = Store::new(3);
    /// let height = Store::new(4);
    /// let area = ReadStore::derived((width.clone(), height), |(w, h): &(i32, i32)| w * h);
    ///
    /// width.set(5);
    /// assert_eq!(area.get(), 20);
    /// ```
    pub fn derived<I, F>(inputs: I, compute: F) -> Self
    where
        I: Inputs,
        F: Fn(&I::Values) -> T + 'static,
    {
        Self::build(inputs, Recompute::simple(compute), DerivedOptions::default())
    }

    /// Derive a store whose function sets the value itself.
    ///
    /// The store holds `initial` until the function first sets a value.
    pub fn derived_manual<I, F>(inputs: I, initial: T, compute: F) -> Self
    where
        I: Inputs,
        F: Fn(&I::Values, &Setter<T>, &ChangeSet<I::Key>) -> Option<Teardown> + 'static,
    {
        Self::build(
            inputs,
            Recompute::manual(compute),
            DerivedOptions::default().initial(initial),
        )
    }
}

impl<T: 'static> ReadStore<T> {
    /// Derive a store with explicit recompute mode and options.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingInitial`] for a [`Recompute::Manual`] without an
    /// `initial` value: a manual function is not required to set one, and a
    /// store must always have a value to replay.
    pub fn derived_with<I>(
        inputs: I,
        recompute: Recompute<I::Values, I::Key, T>,
        options: DerivedOptions<T>,
    ) -> Result<Self>
    where
        I: Inputs,
    {
        if matches!(recompute, Recompute::Manual(_)) && options.initial.is_none() {
            return Err(StoreError::MissingInitial);
        }
        Ok(Self::build(inputs, recompute, options))
    }

    fn build<I>(
        inputs: I,
        recompute: Recompute<I::Values, I::Key, T>,
        options: DerivedOptions<T>,
    ) -> Self
    where
        I: Inputs,
    {
        let DerivedOptions {
            equal,
            initial,
            start,
            changed_only,
        } = options;

        let derivation = Rc::new(Derivation {
            inputs,
            recompute,
            start: RefCell::new(start),
        });

        let store_options = StoreOptions::with_equal(equal)
            .changed_only(changed_only)
            .on_start(move |setter| Some(derivation.activate(setter)));

        Self::from_inner(Inner::new(initial, store_options))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Store;

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn derived_is_lazy() {
        let (calls, count) = counter();
        let source = Store::new(2);

        let doubled = ReadStore::derived(source.clone(), move |n: &i32| {
            count.set(count.get() + 1);
            n * 2
        });

        assert_eq!(calls.get(), 0);
        assert!(!source.is_active());

        let _subscription = doubled.subscribe(|_| {});
        assert_eq!(calls.get(), 1);
        assert!(source.is_active());
    }

    #[test]
    fn derived_follows_input() {
        let source = Store::new(1);
        let doubled = ReadStore::derived(source.clone(), |n: &i32| n * 2);
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();

        let _subscription = doubled.subscribe(move |v| sink.borrow_mut().push(*v));
        source.set(2);
        source.set(3);

        assert_eq!(*log.borrow(), vec![2, 4, 6]);
    }

    #[test]
    fn equal_output_is_not_renotified() {
        let (calls, count) = counter();
        let source = ReadStore::new(1);
        let parity = ReadStore::derived(source.clone(), move |n: &i32| {
            count.set(count.get() + 1);
            n % 2
        });
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let subscription = parity.subscribe(move |v| sink.borrow_mut().push(*v));

        source.touch();
        source.touch();

        assert_eq!(calls.get(), 3);
        assert_eq!(*log.borrow(), vec![1]);

        drop(subscription);
        source.touch();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn deactivation_releases_inputs_and_keeps_value() {
        let source = Store::new(4);
        let half = ReadStore::derived(source.clone(), |n: &i32| n / 2);

        let subscription = half.subscribe(|_| {});
        assert!(source.is_active());
        drop(subscription);

        assert!(!source.is_active());
        assert!(!half.is_active());
        assert!(format!("{half:?}").contains("Some(2)"));
    }

    #[test]
    fn manual_recompute_sets_through_setter() {
        let source = Store::new(1);
        let evens = ReadStore::derived_manual(
            source.clone(),
            0,
            |n: &i32, set: &Setter<i32>, _changed: &ChangeSet<usize>| {
                if n % 2 == 0 {
                    set.set(*n);
                }
                None
            },
        );
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let _subscription = evens.subscribe(move |v| sink.borrow_mut().push(*v));

        source.set(2);
        source.set(3);
        source.set(4);

        assert_eq!(*log.borrow(), vec![0, 2, 4]);
    }

    #[test]
    fn first_change_set_is_empty() {
        let tokens = Rc::new(RefCell::new(Vec::new()));
        let sink = tokens.clone();
        let a = Store::new(1);
        let b = Store::new(2);

        let sum = ReadStore::derived_manual(
            (a.clone(), b.clone()),
            0,
            move |(x, y): &(i32, i32), set: &Setter<i32>, changed: &ChangeSet<usize>| {
                sink.borrow_mut().push(changed.indices().collect::<Vec<_>>());
                set.set(x + y);
                None
            },
        );
        let _subscription = sum.subscribe(|_| {});

        b.set(5);
        a.set(0);

        assert_eq!(*tokens.borrow(), vec![vec![], vec![1], vec![0]]);
        assert_eq!(sum.get(), 5);
    }

    #[test]
    fn start_hook_runs_around_activation() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let start_log = log.clone();
        let compute_log = log.clone();
        let source = Store::new(1);

        let derived = ReadStore::derived_with(
            source.clone(),
            Recompute::manual(move |n: &i32, set: &Setter<i32>, _: &ChangeSet<usize>| {
                compute_log.borrow_mut().push(format!("compute {n}"));
                set.set(*n);
                let cleanup_log = compute_log.clone();
                let cleanup: Teardown =
                    Box::new(move || cleanup_log.borrow_mut().push("cleanup".to_string()));
                Some(cleanup)
            }),
            DerivedOptions::default().initial(0).on_start(move || {
                start_log.borrow_mut().push("start".to_string());
                let stop_log = start_log.clone();
                let teardown: Teardown =
                    Box::new(move || stop_log.borrow_mut().push("stop".to_string()));
                Some(teardown)
            }),
        )
        .unwrap();

        let subscription = derived.subscribe(|_| {});
        source.set(2);
        drop(subscription);

        assert_eq!(
            *log.borrow(),
            vec!["start", "compute 1", "cleanup", "compute 2", "cleanup", "stop"]
        );
    }

    #[test]
    fn initial_value_is_replaced_on_activation() {
        let source = Store::new(7);
        let derived = ReadStore::derived_with(
            source,
            Recompute::simple(|n: &i32| n + 1),
            DerivedOptions::default().initial(-1),
        )
        .unwrap();

        assert_eq!(derived.get(), 8);
    }

    #[test]
    fn manual_without_initial_is_rejected() {
        let source = Store::new(1);

        let result = ReadStore::derived_with(
            source,
            Recompute::manual(|_: &i32, _: &Setter<i32>, _: &ChangeSet<usize>| None),
            DerivedOptions::default(),
        );

        assert!(matches!(result, Err(StoreError::MissingInitial)));
    }

    #[test]
    fn manual_store_that_never_sets_replays_initial() {
        let source = Store::new(1);
        let held: Rc<RefCell<Option<Setter<i32>>>> = Rc::new(RefCell::new(None));
        let slot = held.clone();

        let deferred = ReadStore::derived_with(
            source,
            Recompute::manual(move |_: &i32, set: &Setter<i32>, _: &ChangeSet<usize>| {
                *slot.borrow_mut() = Some(set.clone());
                None
            }),
            DerivedOptions::default().initial(0),
        )
        .unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let _subscription = deferred.subscribe(move |v| sink.borrow_mut().push(*v));

        assert_eq!(*log.borrow(), vec![0]);
        assert_eq!(deferred.get(), 0);
        assert!(held.borrow().is_some());
    }

    #[test]
    fn changed_only_is_stable_across_activations() {
        let source = Store::new(1);
        let doubled = ReadStore::derived_with(
            source.clone(),
            Recompute::simple(|n: &i32| n * 2),
            DerivedOptions::default().changed_only(true),
        )
        .unwrap();

        for round in 0..2 {
            let log = Rc::new(RefCell::new(Vec::new()));
            let sink = log.clone();
            let subscription = doubled.subscribe(move |v| sink.borrow_mut().push(*v));

            source.update(|n| n + 1);

            // Reactivation recomputes an equal value; the next change still notifies
            assert_eq!(*log.borrow(), vec![2 * (round + 1), 2 * (round + 2)]);
            drop(subscription);
        }
    }

    #[test]
    fn vec_inputs_recompute_once_per_change() {
        let (calls, count) = counter();
        let stores: Vec<Store<i32>> = (1..=3).map(Store::new).collect();

        let total = ReadStore::derived(stores.clone(), move |values: &Vec<i32>| {
            count.set(count.get() + 1);
            values.iter().sum::<i32>()
        });
        let _subscription = total.subscribe(|_| {});

        stores[1].set(10);

        assert_eq!(calls.get(), 2);
        assert_eq!(total.get(), 14);
    }

    #[test]
    fn empty_inputs_compute_once() {
        let inputs: Vec<Store<i32>> = Vec::new();
        let constant = ReadStore::derived(inputs, |values: &Vec<i32>| values.len());

        assert_eq!(constant.get(), 0);
    }
}
