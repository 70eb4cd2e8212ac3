//! Thread-safe pool wrapper.
//!
//! [`IdPool`] owns a [`parking_lot::Mutex`] around an [`IdSlab`] and exposes
//! the allocator through `&self`. Every operation acquires the mutex for its
//! own O(log capacity) (or, for [`IdPool::clear`], O(capacity)) body and
//! releases it before returning; nothing blocks while holding it except the
//! array copy inside a growth step.
//!
//! # Two-phase protocol
//!
//! [`IdPool::get_new_above`] (and [`IdPool::get_new`]) never grow the table
//! and perform no heap allocation while the pool mutex is held, so they are
//! safe to call from a context that already holds an unrelated lock of the
//! caller's own. When capacity is insufficient they hand the value back
//! with [`PoolError::Retry`]; the caller then runs [`IdPool::pre_get`] —
//! which may allocate, and therefore must be called with no caller-held
//! lock — and re-issues the original call. `Retry` is never looped on
//! internally.
//!
//! [`IdPool::alloc`] and [`IdPool::allocate`] are the single-phase
//! conveniences for hosted contexts with no such restriction: they grow
//! inside the same lock acquisition.
//!
//! # Reads take the lock
//!
//! [`IdPool::find`], [`IdPool::with`], and [`IdPool::for_each`] serialize
//! against mutators on the same mutex. A lock-free read surface over
//! `Option<T>` slots is not expressible in safe Rust; callers that want
//! read-side concurrency own an [`IdSlab`] directly and layer their own
//! synchronization.

use crate::slab::{IdSlab, MAX_CAPACITY, Rejected};
use idp_error::PoolError;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use tracing::debug;

/// Mutex-guarded id pool; the shared-access form of [`IdSlab`].
#[derive(Debug)]
pub struct IdPool<T> {
    inner: Mutex<IdSlab<T>>,
}

impl<T> Default for IdPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<IdSlab<T>> for IdPool<T> {
    fn from(slab: IdSlab<T>) -> Self {
        Self {
            inner: Mutex::new(slab),
        }
    }
}

impl<T> IdPool<T> {
    /// Create an empty pool with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        let pool = Self::from(IdSlab::new());
        debug!(capacity = pool.capacity(), "idpool: created");
        pool
    }

    /// Create an empty pool with at least `min_capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `min_capacity` exceeds [`MAX_CAPACITY`].
    #[must_use]
    pub fn with_capacity(min_capacity: usize) -> Self {
        Self::from(IdSlab::with_capacity(min_capacity))
    }

    /// Unwrap the pool back into its slab.
    #[must_use]
    pub fn into_inner(self) -> IdSlab<T> {
        self.inner.into_inner()
    }

    /// Blocking half of the two-phase protocol: grow until a free id at or
    /// above the running maximum requested minimum exists.
    ///
    /// May allocate memory; call it with no caller-held lock. Returns
    /// `false` only when growth is impossible (the id ceiling was reached).
    pub fn pre_get(&self) -> bool {
        self.inner.lock().pre_get()
    }

    /// Store `value` at the smallest free id. Non-blocking commit: never
    /// grows; on [`PoolError::Retry`] run [`IdPool::pre_get`] and call
    /// again with the returned value.
    pub fn get_new(&self, value: T) -> Result<usize, Rejected<T>> {
        self.inner.lock().get_new(value)
    }

    /// Store `value` at the smallest free id at or above `min_id`.
    /// Non-blocking commit; see [`IdPool::get_new`].
    pub fn get_new_above(&self, value: T, min_id: usize) -> Result<usize, Rejected<T>> {
        self.inner.lock().get_new_above(value, min_id)
    }

    /// Store `value` at the smallest free id in `[start, end)`, growing as
    /// needed. Single-phase; must not be used where allocation under the
    /// pool lock is unacceptable.
    pub fn alloc(&self, value: T, start: usize, end: usize) -> Result<usize, Rejected<T>> {
        self.inner.lock().alloc(value, start, end)
    }

    /// Store `value` at the smallest free id anywhere, growing as needed.
    ///
    /// The blocking convenience over the same core the two-phase protocol
    /// uses; fails only when the id space itself is exhausted.
    pub fn allocate(&self, value: T) -> Result<usize, Rejected<T>> {
        self.inner.lock().alloc(value, 0, MAX_CAPACITY)
    }

    /// Release `id`, returning its value; `None` if out of range or free.
    pub fn remove(&self, id: usize) -> Option<T> {
        self.inner.lock().remove(id)
    }

    /// Drop every value and reset hints and counters; capacity is kept.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Clone out the value at `id`, if occupied.
    #[must_use]
    pub fn find(&self, id: usize) -> Option<T>
    where
        T: Clone,
    {
        self.inner.lock().get(id).cloned()
    }

    /// Run `f` on the value at `id` under the pool lock, if occupied.
    ///
    /// The non-`Clone` lookup; keep `f` short, it holds up mutators.
    pub fn with<R>(&self, id: usize, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.lock().get(id).map(f)
    }

    /// Swap the value at an occupied `id`, returning the previous value;
    /// the new value comes back in the rejection when `id` is vacant.
    pub fn replace(&self, id: usize, value: T) -> Result<T, Rejected<T>> {
        self.inner.lock().replace(id, value)
    }

    /// Visit occupied slots in ascending id order under the pool lock;
    /// return `ControlFlow::Break(())` to stop early.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(usize, &T) -> ControlFlow<()>,
    {
        self.inner.lock().for_each(f);
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Current capacity (ids live in `[0, capacity)`).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    /// Growth events since creation or the last [`IdPool::clear`].
    #[must_use]
    pub fn expansions(&self) -> u64 {
        self.inner.lock().expansions()
    }
}
