//! Reactive Stores
//!
//! This module implements the store engine: mutable stores, read-only
//! stores, and derived stores that recompute from other stores.
//!
//! # Concepts
//!
//! ## Stores
//!
//! A [`Store`] holds a value. Subscribers register a callback and receive
//! the current value immediately, then every later change. An [`Equal`]
//! policy decides what counts as a change.
//!
//! ## Derived Stores
//!
//! A derived [`ReadStore`] computes its value from a set of [`Inputs`]. It
//! subscribes to its inputs only while it has subscribers of its own, and it
//! recomputes once per update even when several inputs change together.
//!
//! ## Lifecycle
//!
//! Stores are lazy. The start hook runs when the first subscriber arrives and
//! its teardown runs when the last one leaves.
//!
//! # Implementation Notes
//!
//! Updates are delivered in two phases. Each subscriber is first invalidated,
//! then notified through a thread-local queue. The first `set` on the stack
//! owns the queue and drains it; nested `set` calls only enqueue. A derived
//! store does not recompute while any of its inputs is invalidated, which is
//! what keeps diamond-shaped graphs free of glitches.
//!
//! Everything is single-threaded and synchronous: stores are `Rc`-based and
//! all propagation finishes before the outermost `set` returns.

mod equal;
mod queue;
mod subscriber;
mod lifecycle;
mod store;
mod tracker;
mod inputs;
mod derived;

pub use equal::Equal;
pub use subscriber::{SubscriberId, Subscription};
pub use lifecycle::{Setter, StartHook, Teardown};
pub use store::{ReadStore, Readable, Store, StoreOptions};
pub use tracker::{ChangeSet, InputMask};
pub use inputs::{InputPort, Inputs, NamedInputs};
pub use derived::{DerivedOptions, DerivedStartHook, ManualFn, Recompute, SimpleFn};
