#![forbid(unsafe_code)]
//! idpool public API facade.
//!
//! Re-exports the allocator from `idp-core` through a stable external
//! interface. This is the crate downstream consumers depend on.

pub use idp_core::*;
