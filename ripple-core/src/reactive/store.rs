//! Store Implementation
//!
//! A store holds a current value and notifies its subscribers whenever that
//! value changes.
//!
//! # How Stores Work
//!
//! 1. `set` asks the equality policy whether the new value is a change. If it
//!    is not, nothing happens.
//!
//! 2. On a change the value is replaced and, if the store is active, every
//!    subscriber is invalidated and then notified through the notification
//!    queue.
//!
//! 3. Subscribing registers a `(notify, invalidate)` pair. The first
//!    subscriber activates the store (runs its start hook); the new
//!    subscriber then immediately receives the current value.
//!
//! 4. Removing the last subscriber deactivates the store (runs the teardown
//!    returned by the start hook). The value survives and the store can be
//!    activated again later.
//!
//! # Ownership
//!
//! Stores are cheap handles around an `Rc`. Clones share the same value and
//! subscriber set. Stores are single-threaded; propagation happens entirely
//! within the `set` call that caused it.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::trace;

use super::equal::Equal;
use super::lifecycle::{Setter, StartHook, Teardown};
use super::queue::NotifyQueue;
use super::subscriber::{Detach, Subscriber, SubscriberId, Subscription};

/// Counter for generating unique store IDs.
static STORE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique store ID.
fn next_store_id() -> u64 {
    STORE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Construction options for a store.
pub struct StoreOptions<T> {
    pub(crate) equal: Equal<T>,
    pub(crate) start: Option<StartHook<T>>,
    pub(crate) changed_only: bool,
}

impl<T: 'static> StoreOptions<T> {
    /// Options with the given equality policy and nothing else.
    pub fn with_equal(equal: Equal<T>) -> Self {
        Self {
            equal,
            start: None,
            changed_only: false,
        }
    }

    /// Replace the equality policy.
    pub fn equal(mut self, equal: Equal<T>) -> Self {
        self.equal = equal;
        self
    }

    /// Run `start` when the first subscriber arrives.
    ///
    /// The teardown it returns runs when the last subscriber leaves.
    pub fn on_start<F>(mut self, start: F) -> Self
    where
        F: FnMut(&Setter<T>) -> Option<Teardown> + 'static,
    {
        self.start = Some(Box::new(start));
        self
    }

    /// Stay silent on the first accepted `set` after each activation.
    pub fn changed_only(mut self, changed_only: bool) -> Self {
        self.changed_only = changed_only;
        self
    }
}

impl<T: PartialEq + 'static> Default for StoreOptions<T> {
    fn default() -> Self {
        Self::with_equal(Equal::partial_eq())
    }
}

/// Shared state behind every store handle.
pub(crate) struct Inner<T> {
    id: u64,

    /// Empty only for a derived store that has never been computed.
    value: RefCell<Option<Rc<T>>>,

    /// Insertion ordered so a notification pass visits subscribers stably.
    subscribers: RefCell<IndexMap<SubscriberId, Rc<Subscriber<T>>>>,

    equal: Equal<T>,
    start: RefCell<Option<StartHook<T>>>,
    stop: RefCell<Option<Teardown>>,
    active: Cell<bool>,
    changed_only: bool,
    has_changed: Cell<bool>,
}

impl<T: 'static> Inner<T> {
    pub(crate) fn new(value: Option<T>, options: StoreOptions<T>) -> Rc<Self> {
        Rc::new(Self {
            id: next_store_id(),
            value: RefCell::new(value.map(Rc::new)),
            subscribers: RefCell::new(IndexMap::new()),
            equal: options.equal,
            start: RefCell::new(options.start),
            stop: RefCell::new(None),
            active: Cell::new(false),
            changed_only: options.changed_only,
            has_changed: Cell::new(false),
        })
    }

    fn current(&self) -> Option<Rc<T>> {
        self.value.borrow().clone()
    }

    pub(crate) fn set(&self, value: T) {
        let unchanged = match self.value.borrow().as_deref() {
            Some(current) => self.equal.eq(current, &value),
            None => false,
        };
        if unchanged {
            trace!(store = self.id, "set ignored, value unchanged");
            return;
        }

        *self.value.borrow_mut() = Some(Rc::new(value));

        if !self.changed_only || self.has_changed.get() {
            self.process();
        }
        self.has_changed.set(true);
    }

    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        // Clone the handle so `f` runs without the value borrowed
        if let Some(current) = self.current() {
            self.set(f(&current));
        }
    }

    pub(crate) fn mark_changed(&self) {
        self.has_changed.set(true);
    }

    /// Invalidate every subscriber and queue the current value for delivery.
    pub(crate) fn process(&self) {
        if !self.active.get() {
            return;
        }
        let Some(value) = self.current() else {
            return;
        };

        let owns_flush = NotifyQueue::is_idle();
        let subscribers: Vec<Rc<Subscriber<T>>> =
            self.subscribers.borrow().values().cloned().collect();

        for subscriber in subscribers {
            subscriber.invalidate();
            let value = Rc::clone(&value);
            NotifyQueue::enqueue(Box::new(move || subscriber.notify(&value)));
        }

        if owns_flush {
            NotifyQueue::flush();
        }
    }

    pub(crate) fn subscribe(self: &Rc<Self>, subscriber: Subscriber<T>) -> Subscription {
        let id = SubscriberId::new();
        let subscriber = Rc::new(subscriber);

        let first = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.insert(id, Rc::clone(&subscriber));
            subscribers.len() == 1
        };
        if first {
            self.activate();
        }

        if let Some(value) = self.current() {
            subscriber.notify(&value);
        }

        Subscription::new(id, Rc::clone(self) as Rc<dyn Detach>)
    }

    fn activate(self: &Rc<Self>) {
        trace!(store = self.id, "store activated");
        self.has_changed.set(false);

        // Take the hook out so it can subscribe or set without a live borrow
        let hook = self.start.borrow_mut().take();
        let stop = match hook {
            Some(mut hook) => {
                let stop = hook(&Setter::new(Rc::downgrade(self)));
                *self.start.borrow_mut() = Some(hook);
                stop
            }
            None => None,
        };

        *self.stop.borrow_mut() = stop;
        self.active.set(true);
    }

    fn deactivate(&self) {
        trace!(store = self.id, "store deactivated");
        self.active.set(false);

        let stop = self.stop.borrow_mut().take();
        if let Some(stop) = stop {
            stop();
        }
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl<T: 'static> Detach for Inner<T> {
    fn detach(&self, id: SubscriberId) {
        let now_empty = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.shift_remove(&id).is_some() && subscribers.is_empty()
        };
        if now_empty {
            self.deactivate();
        }
    }
}

/// Anything that can be subscribed to.
///
/// Implemented by [`Store`] and [`ReadStore`]; derived stores accept any
/// `Readable` as an input.
pub trait Readable: Clone + 'static {
    /// The type of value delivered to subscribers.
    type Value: 'static;

    /// Subscribe with both a notify and an invalidate callback.
    fn subscribe_with<N, I>(&self, notify: N, invalidate: I) -> Subscription
    where
        N: Fn(&Self::Value) + 'static,
        I: Fn() + 'static;
}

/// A mutable store.
///
/// # Example
///
/// ```rust
/// use ripple_core::Store;
///
/// let count = Store::new(0);
/// let _subscription = count.subscribe(|value| println!("count is {value}"));
///
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Store<T> {
    inner: Rc<Inner<T>>,
}

impl<T: PartialEq + 'static> Store<T> {
    /// Create a store compared with `PartialEq`.
    pub fn new(value: T) -> Self {
        Self::with_options(value, StoreOptions::default())
    }
}

impl<T: 'static> Store<T> {
    /// Create a store with explicit options.
    pub fn with_options(value: T, options: StoreOptions<T>) -> Self {
        Self {
            inner: Inner::new(Some(value), options),
        }
    }

    /// Get the store's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Set a new value and notify subscribers if it changed.
    pub fn set(&self, value: T) {
        self.inner.set(value);
    }

    /// Set a value computed from the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        self.inner.update(f);
    }

    /// Notify subscribers of the current value even though it did not change.
    pub fn touch(&self) {
        self.inner.process();
    }

    /// Subscribe to value changes.
    ///
    /// `notify` is called with the current value before this returns.
    pub fn subscribe<N>(&self, notify: N) -> Subscription
    where
        N: Fn(&T) + 'static,
    {
        self.subscribe_with(notify, || {})
    }

    /// Subscribe with an invalidate callback as well.
    pub fn subscribe_with<N, I>(&self, notify: N, invalidate: I) -> Subscription
    where
        N: Fn(&T) + 'static,
        I: Fn() + 'static,
    {
        self.inner.subscribe(Subscriber::new(notify, invalidate))
    }

    /// A setter for this store, as handed to start hooks.
    pub fn setter(&self) -> Setter<T> {
        Setter::new(Rc::downgrade(&self.inner))
    }

    /// A read-only view of this store.
    pub fn read_only(&self) -> ReadStore<T> {
        ReadStore {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    /// Whether the store currently has subscribers and has been started.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }
}

impl<T: Clone + 'static> Store<T> {
    /// Read the current value by subscribing and unsubscribing.
    pub fn get(&self) -> T {
        snapshot(&self.inner)
    }
}

impl<T: 'static> Readable for Store<T> {
    type Value = T;

    fn subscribe_with<N, I>(&self, notify: N, invalidate: I) -> Subscription
    where
        N: Fn(&T) + 'static,
        I: Fn() + 'static,
    {
        Store::subscribe_with(self, notify, invalidate)
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("value", &self.inner.current())
            .field("subscriber_count", &self.inner.subscriber_count())
            .finish()
    }
}

/// A store that can be observed but not set from outside.
///
/// Its value changes only through its start hook's [`Setter`], or through its
/// recompute function when it is a derived store.
pub struct ReadStore<T> {
    pub(crate) inner: Rc<Inner<T>>,
}

impl<T: PartialEq + 'static> ReadStore<T> {
    /// Create a read-only store compared with `PartialEq`.
    pub fn new(value: T) -> Self {
        Self::with_options(value, StoreOptions::default())
    }
}

impl<T: 'static> ReadStore<T> {
    /// Create a read-only store with explicit options.
    pub fn with_options(value: T, options: StoreOptions<T>) -> Self {
        Self {
            inner: Inner::new(Some(value), options),
        }
    }

    pub(crate) fn from_inner(inner: Rc<Inner<T>>) -> Self {
        Self { inner }
    }

    /// Get the store's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Notify subscribers of the current value even though it did not change.
    pub fn touch(&self) {
        self.inner.process();
    }

    /// Subscribe to value changes.
    ///
    /// `notify` is called with the current value before this returns.
    pub fn subscribe<N>(&self, notify: N) -> Subscription
    where
        N: Fn(&T) + 'static,
    {
        self.subscribe_with(notify, || {})
    }

    /// Subscribe with an invalidate callback as well.
    pub fn subscribe_with<N, I>(&self, notify: N, invalidate: I) -> Subscription
    where
        N: Fn(&T) + 'static,
        I: Fn() + 'static,
    {
        self.inner.subscribe(Subscriber::new(notify, invalidate))
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    /// Whether the store currently has subscribers and has been started.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }
}

impl<T: Clone + 'static> ReadStore<T> {
    /// Read the current value by subscribing and unsubscribing.
    ///
    /// A dormant derived store is computed for the duration of the call.
    pub fn get(&self) -> T {
        snapshot(&self.inner)
    }
}

impl<T: 'static> Readable for ReadStore<T> {
    type Value = T;

    fn subscribe_with<N, I>(&self, notify: N, invalidate: I) -> Subscription
    where
        N: Fn(&T) + 'static,
        I: Fn() + 'static,
    {
        ReadStore::subscribe_with(self, notify, invalidate)
    }
}

impl<T> Clone for ReadStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> From<Store<T>> for ReadStore<T> {
    fn from(store: Store<T>) -> Self {
        Self { inner: store.inner }
    }
}

impl<T: Debug + 'static> Debug for ReadStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadStore")
            .field("id", &self.inner.id)
            .field("value", &self.inner.current())
            .field("subscriber_count", &self.inner.subscriber_count())
            .finish()
    }
}

fn snapshot<T: Clone + 'static>(inner: &Rc<Inner<T>>) -> T {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);

    let subscription = inner.subscribe(Subscriber::new(
        move |value: &T| *sink.borrow_mut() = Some(value.clone()),
        || {},
    ));
    subscription.unsubscribe();

    let value = slot.borrow_mut().take();
    value.expect("store has no value after activation")
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
