#![forbid(unsafe_code)]
//! Error types for the idpool allocator.
//!
//! # Error Taxonomy
//!
//! Every fallible pool operation returns one of four conditions:
//!
//! | Variant | Kind | Meaning |
//! |---------|------|---------|
//! | `Retry` | transient | current capacity cannot satisfy the request; grow via `pre_get` outside any caller-held lock, then re-issue |
//! | `NoSpace` | terminal | the requested bounded range is exhausted even after growth, or the absolute id ceiling was hit |
//! | `InvalidRange` | terminal | malformed arguments (empty or inverted range, bound past the id ceiling) |
//! | `NotFound` | terminal | lookup or replace of an absent or unoccupied id |
//!
//! `Retry` is the only non-terminal variant and is never retried internally:
//! the non-blocking commit path must not allocate memory, so the growth step
//! is pushed back to the caller, who performs it without holding any lock of
//! their own. Treating `Retry` as a hard failure is a caller bug.
//!
//! ## Design Constraints
//!
//! - `idp-error` MUST NOT depend on any sibling workspace crate (no cyclic
//!   deps); it is the leaf every other crate converges on.
//! - Internal invariant violations (e.g. an occupancy count underflow) are
//!   defects, not errors — they panic rather than surface here.

use thiserror::Error;

/// Unified error type for all idpool operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Current capacity cannot satisfy the request right now.
    ///
    /// Returned by the non-blocking commit path (`get_new_above`) when no
    /// free id exists at or above the requested minimum within the table's
    /// current capacity. The caller must invoke `pre_get` — outside any
    /// lock it cannot release — and then re-issue the original call.
    #[error("no free id at current capacity, grow and retry")]
    Retry,

    /// The requested bounded range is exhausted, even after growth.
    ///
    /// Also returned when growth itself is impossible because the next
    /// capacity step would exceed the absolute id ceiling.
    #[error("id range exhausted")]
    NoSpace,

    /// Malformed range arguments (`end <= start`, or a bound past the
    /// absolute id ceiling).
    #[error("invalid id range [{start}, {end})")]
    InvalidRange { start: usize, end: usize },

    /// Lookup or replace addressed an id that is out of range or holds
    /// no value.
    #[error("id {0} not found")]
    NotFound(usize),
}

impl PoolError {
    /// Whether the operation may succeed if re-issued after `pre_get`.
    ///
    /// Only `Retry` is transient; everything else is terminal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Retry)
    }
}

/// Result alias using `PoolError`.
pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_retry_is_transient() {
        assert!(PoolError::Retry.is_transient());
        assert!(!PoolError::NoSpace.is_transient());
        assert!(!PoolError::InvalidRange { start: 5, end: 5 }.is_transient());
        assert!(!PoolError::NotFound(7).is_transient());
    }

    #[test]
    fn display_formatting() {
        assert_eq!(
            PoolError::Retry.to_string(),
            "no free id at current capacity, grow and retry"
        );
        assert_eq!(PoolError::NoSpace.to_string(), "id range exhausted");
        assert_eq!(
            PoolError::InvalidRange { start: 9, end: 3 }.to_string(),
            "invalid id range [9, 3)"
        );
        assert_eq!(PoolError::NotFound(42).to_string(), "id 42 not found");
    }
}
