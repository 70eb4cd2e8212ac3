#![forbid(unsafe_code)]
//! Growable integer-handle allocator.
//!
//! Assigns small, reusable, non-negative integer ids to opaque values.
//! The free-id search runs in O(log capacity) over an implicit occupancy
//! tree laid flat in the node array (see [`tree`]); capacity grows on
//! demand in `2^k - 1` steps without ever disturbing an existing id.
//!
//! Two entry points:
//!
//! - [`IdSlab`] — the `&mut self` core, for single-threaded use or
//!   caller-managed locking.
//! - [`IdPool`] — the mutex-guarded `&self` wrapper, with the two-phase
//!   `pre_get`/`get_new_above` protocol for callers that must commit ids
//!   without allocating under their own locks.
//!
//! ```
//! use idp_core::IdPool;
//!
//! let pool = IdPool::new();
//! let a = pool.allocate("alpha").unwrap();
//! let b = pool.allocate("beta").unwrap();
//! assert_eq!((a, b), (0, 1));
//!
//! assert_eq!(pool.remove(a), Some("alpha"));
//! assert_eq!(pool.allocate("gamma").unwrap(), 0); // smallest id is reused
//! assert_eq!(pool.find(b), Some("beta"));
//! ```

pub mod tree;

mod pool;
mod slab;

pub use idp_error::{PoolError, Result};
pub use pool::IdPool;
pub use slab::{DEFAULT_CAPACITY, IdSlab, MAX_CAPACITY, MAX_ID, Rejected};
