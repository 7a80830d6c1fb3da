//! Subscriber types for stores.
//!
//! A subscriber is a `(notify, invalidate)` pair registered against exactly one
//! store. `invalidate` announces that a new value is on its way; `notify`
//! delivers it. Callers hold a [`Subscription`] handle for as long as they
//! want to stay subscribed.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// The callbacks registered by one subscription.
pub(crate) struct Subscriber<T> {
    notify: Box<dyn Fn(&T)>,
    invalidate: Box<dyn Fn()>,
}

impl<T> Subscriber<T> {
    pub(crate) fn new<N, I>(notify: N, invalidate: I) -> Self
    where
        N: Fn(&T) + 'static,
        I: Fn() + 'static,
    {
        Self {
            notify: Box::new(notify),
            invalidate: Box::new(invalidate),
        }
    }

    pub(crate) fn notify(&self, value: &T) {
        (self.notify)(value);
    }

    pub(crate) fn invalidate(&self) {
        (self.invalidate)();
    }
}

/// Something a subscription can be removed from.
pub(crate) trait Detach {
    fn detach(&self, id: SubscriberId);
}

/// Handle to an active subscription.
///
/// Dropping the handle unsubscribes. Calling [`Subscription::unsubscribe`]
/// more than once has no further effect.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    source: Rc<dyn Detach>,
    done: Cell<bool>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, source: Rc<dyn Detach>) -> Self {
        Self {
            id,
            source,
            done: Cell::new(false),
        }
    }

    /// The subscriber ID this handle controls.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscription from its store.
    pub fn unsubscribe(&self) {
        if !self.done.replace(true) {
            self.source.detach(self.id);
        }
    }

    /// Whether this handle is still subscribed.
    pub fn is_active(&self) -> bool {
        !self.done.get()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
