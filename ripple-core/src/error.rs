//! Error types for store construction.
//!
//! The propagation engine itself never fails: `set`, `touch`, `subscribe` and
//! unsubscribing have no error paths. Errors only come from validating the
//! configuration handed to a constructor, and they are reported at that call.

use thiserror::Error;

/// Errors raised while building stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Duplicate input key: {0}")]
    DuplicateInput(String),

    #[error("Manual recompute needs an initial value")]
    MissingInitial,
}

/// Result type for store construction.
pub type Result<T> = std::result::Result<T, StoreError>;
