//! Ripple Core
//!
//! This crate provides a synchronous, glitch-free store engine.
//! It implements:
//!
//! - Mutable and read-only stores with pluggable equality
//! - Derived stores over positional or named inputs
//! - Lazy start/stop lifecycles driven by subscriber count
//! - Ordered delivery of reentrant updates
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: stores, derived stores, and the notification machinery
//! - `error`: construction errors
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{ReadStore, Store};
//!
//! let count = Store::new(1);
//!
//! // Two views of the same root
//! let doubled = ReadStore::derived(count.clone(), |n: &i32| n * 2);
//! let squared = ReadStore::derived(count.clone(), |n: &i32| n * n);
//!
//! // Recomputes once per update, never with one side stale
//! let summary = ReadStore::derived((doubled, squared), |(d, s): &(i32, i32)| {
//!     format!("{d} / {s}")
//! });
//!
//! let _subscription = summary.subscribe(|text| println!("{text}"));
//! count.set(3); // prints "6 / 9"
//! ```

pub mod error;
pub mod reactive;

pub use error::{Result, StoreError};
pub use reactive::{
    ChangeSet, DerivedOptions, Equal, NamedInputs, ReadStore, Readable, Recompute, Setter, Store,
    StoreOptions, Subscription, Teardown,
};
