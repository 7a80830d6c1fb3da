//! Lifecycle Hooks
//!
//! Stores are lazy. A store's start hook runs when its first subscriber
//! arrives, and the teardown the hook returned runs when the last subscriber
//! leaves. The hook receives a [`Setter`] so it can push values into the
//! store while it is live, for example from an external event source.

use std::fmt;
use std::rc::Weak;

use tracing::trace;

use super::store::Inner;

/// A callback run once to release whatever a hook or recompute acquired.
pub type Teardown = Box<dyn FnOnce()>;

/// Start hook for a store: runs on the transition from zero to one subscriber.
pub type StartHook<T> = Box<dyn FnMut(&Setter<T>) -> Option<Teardown>>;

/// Write access to a store, handed to start hooks and manual recomputes.
///
/// A setter does not keep its store alive. Once the store is gone, calls on
/// the setter do nothing.
pub struct Setter<T> {
    store: Weak<Inner<T>>,
}

impl<T: 'static> Setter<T> {
    pub(crate) fn new(store: Weak<Inner<T>>) -> Self {
        Self { store }
    }

    /// Set a new value, subject to the store's equality policy.
    pub fn set(&self, value: T) {
        match self.store.upgrade() {
            Some(store) => store.set(value),
            None => trace!("setter outlived its store, value dropped"),
        }
    }

    /// Set a value computed from the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        if let Some(store) = self.store.upgrade() {
            store.update(f);
        }
    }

    /// Re-notify the current value, bypassing the equality policy.
    pub fn touch(&self) {
        if let Some(store) = self.store.upgrade() {
            store.process();
        }
    }

    /// Count the current value as the first change since activation.
    pub(crate) fn mark_changed(&self) {
        if let Some(store) = self.store.upgrade() {
            store.mark_changed();
        }
    }

    /// Whether the store behind this setter still exists.
    pub fn is_alive(&self) -> bool {
        self.store.strong_count() > 0
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            store: Weak::clone(&self.store),
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("alive", &(self.store.strong_count() > 0))
            .finish()
    }
}
