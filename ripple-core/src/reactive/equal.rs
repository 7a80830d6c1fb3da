//! Equality Policies
//!
//! Every accepted `set` goes through an equality policy first. If the policy
//! says the new value equals the current one, the call is a no-op: no
//! notification, no downstream recompute. Picking a stricter or looser
//! policy is how callers control how far a change travels.
//!
//! `touch` never consults the policy.

use std::fmt;
use std::rc::Rc;

/// A shared comparison deciding whether a new value is a change.
///
/// Returns `true` when the two values are considered equal.
pub struct Equal<T> {
    compare: Rc<dyn Fn(&T, &T) -> bool>,
}

impl<T: 'static> Equal<T> {
    /// Use a caller-supplied comparison.
    pub fn by<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        Self {
            compare: Rc::new(compare),
        }
    }

    /// Treat every `set` as a change.
    pub fn never() -> Self {
        Self::by(|_, _| false)
    }

    /// Compare the two values.
    pub fn eq(&self, current: &T, next: &T) -> bool {
        (self.compare)(current, next)
    }
}

impl<T: PartialEq + 'static> Equal<T> {
    /// Compare with `PartialEq`. The default for every store.
    pub fn partial_eq() -> Self {
        Self::by(|a: &T, b: &T| a == b)
    }
}

impl<U: 'static> Equal<Rc<U>> {
    /// Compare shared values by identity rather than content.
    pub fn pointer() -> Self {
        Self::by(|a: &Rc<U>, b: &Rc<U>| Rc::ptr_eq(a, b))
    }
}

impl<T: PartialEq + 'static> Default for Equal<T> {
    fn default() -> Self {
        Self::partial_eq()
    }
}

impl<T> Clone for Equal<T> {
    fn clone(&self) -> Self {
        Self {
            compare: Rc::clone(&self.compare),
        }
    }
}

impl<T> fmt::Debug for Equal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equal").finish_non_exhaustive()
    }
}
