//! Input Shapes for Derived Stores
//!
//! A derived store can read from:
//!
//! - a single store (`Store<V>` or `ReadStore<V>`), seen as a bare `V`
//! - a `Vec` of stores of one type, seen as `Vec<V>`
//! - a tuple of up to six stores of any types, seen as a tuple of values
//! - [`NamedInputs`], seen as an `IndexMap` from name to value
//!
//! Positional shapes report changes by position (`usize`); named inputs
//! report them by name. Every shape drives the same sync algorithm.

use std::cell::RefCell;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use super::store::{ReadStore, Readable, Store};
use super::subscriber::Subscription;
use crate::error::{Result, StoreError};

/// Receives the invalidate/notify signals of a derived store's inputs.
pub trait InputPort {
    /// The input at `index` has a new value on its way.
    fn invalidated(&self, index: usize);

    /// The input at `index` delivered a value; it is already in the slots.
    fn notified(&self, index: usize);
}

/// A set of stores a derived store reads from.
pub trait Inputs: 'static {
    /// What the recompute function receives.
    type Values: 'static;

    /// How a changed input is identified.
    type Key: Clone + Debug + 'static;

    /// Last received value per input, filled in as inputs notify.
    type Slots: 'static;

    /// Number of inputs.
    fn len(&self) -> usize;

    /// Key of the input at `index`.
    fn key(&self, index: usize) -> Self::Key;

    /// Slots with no values received yet.
    fn empty_slots(&self) -> Self::Slots;

    /// Assemble the values, or `None` if some input has not reported yet.
    fn assemble(&self, slots: &Self::Slots) -> Option<Self::Values>;

    /// Subscribe to every input in order, writing values into `slots` and
    /// forwarding signals to `port`.
    fn connect(
        &self,
        slots: &Rc<RefCell<Self::Slots>>,
        port: &Rc<dyn InputPort>,
    ) -> Vec<Subscription>;
}

/// Subscribe to one input, storing each value before signalling the port.
fn link<R, S, W>(
    store: &R,
    index: usize,
    slots: &Rc<RefCell<S>>,
    port: &Rc<dyn InputPort>,
    write: W,
) -> Subscription
where
    R: Readable,
    S: 'static,
    W: Fn(&mut S, &R::Value) + 'static,
{
    let slots = Rc::clone(slots);
    let notify_port = Rc::clone(port);
    let invalidate_port = Rc::clone(port);

    store.subscribe_with(
        move |value| {
            write(&mut *slots.borrow_mut(), value);
            notify_port.notified(index);
        },
        move || invalidate_port.invalidated(index),
    )
}

macro_rules! single_input {
    ($store:ident) => {
        impl<V: Clone + 'static> Inputs for $store<V> {
            type Values = V;
            type Key = usize;
            type Slots = Option<V>;

            fn len(&self) -> usize {
                1
            }

            fn key(&self, index: usize) -> usize {
                index
            }

            fn empty_slots(&self) -> Option<V> {
                None
            }

            fn assemble(&self, slots: &Option<V>) -> Option<V> {
                slots.clone()
            }

            fn connect(
                &self,
                slots: &Rc<RefCell<Option<V>>>,
                port: &Rc<dyn InputPort>,
            ) -> Vec<Subscription> {
                vec![link(self, 0, slots, port, |slot: &mut Option<V>, value: &V| {
                    *slot = Some(value.clone())
                })]
            }
        }
    };
}

single_input!(Store);
single_input!(ReadStore);

impl<R> Inputs for Vec<R>
where
    R: Readable,
    R::Value: Clone,
{
    type Values = Vec<R::Value>;
    type Key = usize;
    type Slots = Vec<Option<R::Value>>;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn key(&self, index: usize) -> usize {
        index
    }

    fn empty_slots(&self) -> Self::Slots {
        vec![None; Vec::len(self)]
    }

    fn assemble(&self, slots: &Self::Slots) -> Option<Self::Values> {
        slots.iter().cloned().collect()
    }

    fn connect(
        &self,
        slots: &Rc<RefCell<Self::Slots>>,
        port: &Rc<dyn InputPort>,
    ) -> Vec<Subscription> {
        self.iter()
            .enumerate()
            .map(|(index, store)| {
                link(store, index, slots, port, move |slots: &mut Self::Slots, value: &R::Value| {
                    slots[index] = Some(value.clone())
                })
            })
            .collect()
    }
}

macro_rules! tuple_inputs {
    ($len:expr; $($name:ident : $index:tt),+) => {
        impl<$($name),+> Inputs for ($($name,)+)
        where
            $($name: Readable, $name::Value: Clone,)+
        {
            type Values = ($($name::Value,)+);
            type Key = usize;
            type Slots = ($(Option<$name::Value>,)+);

            fn len(&self) -> usize {
                $len
            }

            fn key(&self, index: usize) -> usize {
                index
            }

            fn empty_slots(&self) -> Self::Slots {
                ($(None::<$name::Value>,)+)
            }

            fn assemble(&self, slots: &Self::Slots) -> Option<Self::Values> {
                Some(($(slots.$index.clone()?,)+))
            }

            fn connect(
                &self,
                slots: &Rc<RefCell<Self::Slots>>,
                port: &Rc<dyn InputPort>,
            ) -> Vec<Subscription> {
                vec![$(
                    link(&self.$index, $index, slots, port, |slots: &mut Self::Slots, value: &$name::Value| {
                        slots.$index = Some(value.clone())
                    }),
                )+]
            }
        }
    };
}

tuple_inputs!(1; A: 0);
tuple_inputs!(2; A: 0, B: 1);
tuple_inputs!(3; A: 0, B: 1, C: 2);
tuple_inputs!(4; A: 0, B: 1, C: 2, D: 3);
tuple_inputs!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_inputs!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Inputs addressed by name.
///
/// Names keep their insertion order, which is also the order inputs are
/// subscribed in.
pub struct NamedInputs<K, V> {
    stores: IndexMap<K, ReadStore<V>>,
}

impl<K, V> NamedInputs<K, V>
where
    K: Clone + Debug + Eq + Hash + 'static,
    V: Clone + 'static,
{
    /// Build named inputs, rejecting repeated names.
    pub fn new<I>(stores: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, ReadStore<V>)>,
    {
        let mut map = IndexMap::new();
        for (key, store) in stores {
            if map.contains_key(&key) {
                return Err(StoreError::DuplicateInput(format!("{key:?}")));
            }
            map.insert(key, store);
        }
        Ok(Self { stores: map })
    }

    /// The store registered under `key`.
    pub fn get(&self, key: &K) -> Option<&ReadStore<V>> {
        self.stores.get(key)
    }
}

impl<K, V> Inputs for NamedInputs<K, V>
where
    K: Clone + Debug + Eq + Hash + 'static,
    V: Clone + 'static,
{
    type Values = IndexMap<K, V>;
    type Key = K;
    type Slots = Vec<Option<V>>;

    fn len(&self) -> usize {
        self.stores.len()
    }

    fn key(&self, index: usize) -> K {
        self.stores
            .get_index(index)
            .map(|(key, _)| key.clone())
            .expect("input index out of range")
    }

    fn empty_slots(&self) -> Vec<Option<V>> {
        vec![None; self.stores.len()]
    }

    fn assemble(&self, slots: &Vec<Option<V>>) -> Option<IndexMap<K, V>> {
        self.stores
            .keys()
            .zip(slots.iter())
            .map(|(key, value)| value.clone().map(|value| (key.clone(), value)))
            .collect()
    }

    fn connect(
        &self,
        slots: &Rc<RefCell<Vec<Option<V>>>>,
        port: &Rc<dyn InputPort>,
    ) -> Vec<Subscription> {
        self.stores
            .values()
            .enumerate()
            .map(|(index, store)| {
                link(store, index, slots, port, move |slots: &mut Vec<Option<V>>, value: &V| {
                    slots[index] = Some(value.clone())
                })
            })
            .collect()
    }
}
