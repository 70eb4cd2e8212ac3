//! Single-threaded allocator core.
//!
//! [`IdSlab`] owns a flat array of nodes interpreted through the implicit
//! occupancy tree in [`crate::tree`]. Every mutating operation keeps one
//! invariant: for each index `n`, `nodes[n].owned` equals the number of
//! occupied slots in the run `[n, n + subtree_span(n))`. Smallest-free-id
//! search, commit, and release are all O(log capacity) walks over that
//! aggregate; only [`IdSlab::clear`] and iteration touch every slot.
//!
//! The slab has no lock and takes `&mut self` for mutation. Callers that
//! need shared-access semantics wrap it in [`crate::pool::IdPool`], which
//! adds the mutex and the two-phase grow-outside-the-lock protocol.
//!
//! # Capacity
//!
//! Capacity is always of the form `2^k - 1` and only grows. Growth is
//! prefix-stable: an existing index keeps its run and its meaning forever,
//! new indices appear above the old capacity with zeroed counts. That is
//! what lets [`IdSlab::grow`] move nodes into a longer array without any
//! re-indexing.

use crate::tree;
use idp_error::PoolError;
use std::ops::ControlFlow;
use tracing::{debug, trace};

/// Default initial capacity of a freshly created slab.
pub const DEFAULT_CAPACITY: usize = 255;

/// Largest permitted node-array length (`2^31 - 1`).
pub const MAX_CAPACITY: usize = (1_usize << 31) - 1;

/// Largest id the allocator will ever hand out.
pub const MAX_ID: usize = MAX_CAPACITY - 1;

/// A failed storing operation, handing the caller's value back.
///
/// The non-blocking commit path cannot grow the table, so a `Retry` outcome
/// is expected in normal operation; the caller runs `pre_get` outside any
/// lock it holds and re-issues the call with the same value. Mirrors the
/// `std::sync::mpsc::TrySendError` convention.
#[derive(Debug)]
pub struct Rejected<T> {
    /// The value that was not stored.
    pub value: T,
    /// Why it was not stored.
    pub error: PoolError,
}

impl<T> Rejected<T> {
    fn new(value: T, error: PoolError) -> Self {
        Self { value, error }
    }

    /// Recover the unstored value.
    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T> std::fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl<T: std::fmt::Debug> std::error::Error for Rejected<T> {}

/// One slot plus its occupancy aggregate.
#[derive(Debug)]
struct Node<T> {
    value: Option<T>,
    /// Occupied-slot count of the run `[n, n + subtree_span(n))`.
    owned: u32,
}

impl<T> Node<T> {
    fn empty() -> Self {
        Self {
            value: None,
            owned: 0,
        }
    }
}

/// Growable table assigning the smallest free non-negative integer id to
/// each stored value.
///
/// Ids are dense, reusable, and bounded by [`MAX_ID`]. Lookup, commit, and
/// release are O(log capacity); [`IdSlab::clear`] is O(capacity).
#[derive(Debug)]
pub struct IdSlab<T> {
    nodes: Vec<Node<T>>,
    /// Every slot below this index is known occupied (lower bound, may
    /// under-claim).
    free_hint: usize,
    /// Highest index that may still be occupied; `None` when empty.
    last_used: Option<usize>,
    /// Largest minimum id ever requested through the two-phase protocol;
    /// [`IdSlab::pre_get`] grows until this is satisfiable.
    max_want: usize,
    /// Growth events since creation (diagnostic).
    expansions: u64,
    /// Occupied-slot count.
    live: usize,
}

impl<T> Default for IdSlab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IdSlab<T> {
    /// Create an empty slab with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty slab whose capacity is the smallest `2^k - 1` at or
    /// above `min_capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `min_capacity` exceeds [`MAX_CAPACITY`].
    #[must_use]
    pub fn with_capacity(min_capacity: usize) -> Self {
        assert!(
            min_capacity <= MAX_CAPACITY,
            "min_capacity ({min_capacity}) exceeds MAX_CAPACITY ({MAX_CAPACITY})"
        );
        let mut cap = 1_usize;
        while cap < min_capacity {
            cap = 2 * cap + 1;
        }
        let mut nodes = Vec::new();
        nodes.resize_with(cap, Node::empty);
        Self {
            nodes,
            free_hint: 0,
            last_used: None,
            max_want: 0,
            expansions: 0,
            live: 0,
        }
    }

    /// Current node-array length; ids live in `[0, capacity)`.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Growth events since creation (or since the last [`IdSlab::clear`]).
    #[must_use]
    pub fn expansions(&self) -> u64 {
        self.expansions
    }

    // ── Reservation tracking ────────────────────────────────────────────

    /// Apply an occupancy delta for slot `id` to every aggregation root
    /// covering it.
    ///
    /// # Panics
    ///
    /// Panics if a count would go negative: that means a slot was released
    /// twice, which is a caller bug, not a recoverable condition.
    fn reserve(&mut self, id: usize, delta: i32) {
        debug_assert!(delta == 1 || delta == -1);
        let mut at = Some(id);
        while let Some(n) = at {
            let owned = &mut self.nodes[n].owned;
            *owned = if delta > 0 {
                *owned + 1
            } else {
                owned
                    .checked_sub(1)
                    .expect("occupancy count underflow: id released twice")
            };
            at = tree::left_ancestor(n);
        }
    }

    // ── Free-slot search ────────────────────────────────────────────────

    /// Smallest unoccupied index in `[start, limit)`, or `None`.
    ///
    /// `limit` is clamped to the current capacity. The walk starts at
    /// `max(start, free_hint)`, climbs full runs via `right_ancestor`, and
    /// descends into the first partially-full run by successive halving,
    /// preferring the lower half so ties resolve to the smallest index.
    /// O(log capacity).
    #[must_use]
    pub fn find_free(&self, start: usize, limit: usize) -> Option<usize> {
        let limit = limit.min(self.capacity());
        let mut id = start.max(self.free_hint);
        let found = loop {
            if id >= limit {
                return None;
            }
            if self.nodes[id].owned == 0 {
                // Whole run empty, root included.
                break id;
            }
            let span = tree::subtree_span(id);
            if self.nodes[id].owned as usize == span {
                // Whole run occupied; move to the run on its right.
                id = tree::right_ancestor(id);
                continue;
            }

            // Partially full: the free slot is somewhere in this run.
            // Inspect upper halves of shrinking width; `rsum` carries the
            // occupancy of the upper halves already split off, so the
            // remaining lower part (which includes the current root slot)
            // is full exactly when owned == rsum + half.
            let mut rsum = 0_usize;
            let mut half = span / 2;
            while half > 0 {
                let upper = id + half;
                rsum += self.nodes[upper].owned as usize;
                if self.nodes[id].owned as usize == rsum + half {
                    id = upper;
                    if self.nodes[id].owned == 0 {
                        break;
                    }
                    rsum = 0;
                }
                half /= 2;
            }
            // Either the loop broke on an empty run root, or it ran out of
            // halves and the root slot itself is the free one.
            break id;
        };
        // The descent never skips a free slot, so a result at or past the
        // limit means nothing in range was free.
        (found < limit).then_some(found)
    }

    // ── Capacity management ─────────────────────────────────────────────

    /// Ensure `want` is a valid index, growing to the smallest `2^m - 1`
    /// strictly greater than it.
    ///
    /// Prefix-stable: existing nodes keep their index and their run. A
    /// no-op when `want` already fits.
    fn grow(&mut self, want: usize) -> Result<(), PoolError> {
        let old = self.capacity();
        if want < old {
            return Ok(());
        }
        let mut cap = old;
        while cap <= want {
            if cap >= MAX_CAPACITY {
                return Err(PoolError::NoSpace);
            }
            cap = 2 * cap + 1;
        }
        self.nodes.resize_with(cap, Node::empty);
        self.expansions += 1;
        debug!(
            old_capacity = old,
            new_capacity = cap,
            expansions = self.expansions,
            "idslab: expanding"
        );
        Ok(())
    }

    /// Make sure at least one free id at or above the running maximum
    /// requested minimum exists, growing as needed.
    ///
    /// This is the blocking half of the two-phase protocol: it may allocate
    /// memory, so call it without holding any lock you cannot release.
    /// Returns `false` only if the required capacity would exceed
    /// [`MAX_CAPACITY`].
    pub fn pre_get(&mut self) -> bool {
        let want = self.max_want;
        if want >= self.capacity() && self.grow(want).is_err() {
            return false;
        }
        while self.find_free(want, self.capacity()).is_none() {
            let cap = self.capacity();
            if self.grow(cap).is_err() {
                return false;
            }
        }
        true
    }

    // ── Allocation ──────────────────────────────────────────────────────

    /// Store `value` at the smallest free id, never growing.
    ///
    /// Equivalent to [`IdSlab::get_new_above`] with a minimum of 0.
    pub fn get_new(&mut self, value: T) -> Result<usize, Rejected<T>> {
        self.get_new_above(value, 0)
    }

    /// Store `value` at the smallest free id `>= min_id` within the
    /// current capacity.
    ///
    /// Never grows and never allocates, so it is safe to call while the
    /// caller holds an unrelated lock. When the current capacity cannot
    /// satisfy the request, `min_id` is recorded as the new running
    /// maximum and the value comes back with [`PoolError::Retry`]: run
    /// [`IdSlab::pre_get`] (outside any lock), then call again.
    pub fn get_new_above(&mut self, value: T, min_id: usize) -> Result<usize, Rejected<T>> {
        if min_id > MAX_ID {
            return Err(Rejected::new(
                value,
                PoolError::InvalidRange {
                    start: min_id,
                    end: MAX_CAPACITY,
                },
            ));
        }
        match self.find_free(min_id, self.capacity()) {
            Some(id) => {
                self.commit(id, value, min_id);
                Ok(id)
            }
            None => {
                self.max_want = self.max_want.max(min_id);
                Err(Rejected::new(value, PoolError::Retry))
            }
        }
    }

    /// Store `value` at the smallest free id in `[start, end)`, growing
    /// internally as needed.
    ///
    /// Because it may grow, this must not be called from a context that
    /// cannot allocate; use the two-phase protocol there instead. Fails
    /// with `InvalidRange` when `end <= start` or `start` exceeds
    /// [`MAX_ID`], and with `NoSpace` when the range is exhausted.
    pub fn alloc(&mut self, value: T, start: usize, end: usize) -> Result<usize, Rejected<T>> {
        if end <= start || start > MAX_ID {
            return Err(Rejected::new(value, PoolError::InvalidRange { start, end }));
        }
        if start >= self.capacity() {
            if let Err(error) = self.grow(start) {
                return Err(Rejected::new(value, error));
            }
        }
        let id = loop {
            if let Some(id) = self.find_free(start, end) {
                break id;
            }
            if self.capacity() >= end {
                return Err(Rejected::new(value, PoolError::NoSpace));
            }
            let cap = self.capacity();
            if let Err(error) = self.grow(cap) {
                return Err(Rejected::new(value, error));
            }
        };
        self.commit(id, value, start);
        Ok(id)
    }

    /// Occupy `id` with `value`. `id` must be free; `min_id` is the
    /// requested minimum, used to advance the free hint.
    fn commit(&mut self, id: usize, value: T, min_id: usize) {
        debug_assert!(self.nodes[id].value.is_none(), "commit over occupied id");
        self.nodes[id].value = Some(value);
        self.reserve(id, 1);
        self.live += 1;
        if self.last_used.map_or(true, |last| id > last) {
            self.last_used = Some(id);
        }
        // The search proved everything in [min_id, id) occupied; when it
        // started at or below the hint, the hint may advance to the slot
        // just granted.
        if min_id <= self.free_hint {
            self.free_hint = id;
        }
        trace!(id, live = self.live, "idslab: commit");
    }

    // ── Removal / lookup / iteration ────────────────────────────────────

    /// Release `id`, returning its value. A no-op `None` when `id` is out
    /// of range or already free, so a double release through this method
    /// is harmless.
    pub fn remove(&mut self, id: usize) -> Option<T> {
        let value = self.nodes.get_mut(id)?.value.take()?;
        self.reserve(id, -1);
        self.live -= 1;
        if id < self.free_hint {
            self.free_hint = id;
        }
        while let Some(last) = self.last_used {
            if self.nodes[last].value.is_some() {
                break;
            }
            self.last_used = last.checked_sub(1);
        }
        trace!(id, live = self.live, "idslab: remove");
        Some(value)
    }

    /// Drop every value and reset every count, hint, and the expansion
    /// counter in one pass. Capacity is retained. O(capacity).
    pub fn clear(&mut self) {
        for node in &mut self.nodes {
            node.value = None;
            node.owned = 0;
        }
        self.free_hint = 0;
        self.last_used = None;
        self.max_want = 0;
        self.expansions = 0;
        self.live = 0;
    }

    /// Borrow the value at `id`, if occupied.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<&T> {
        self.nodes.get(id)?.value.as_ref()
    }

    /// Mutably borrow the value at `id`, if occupied.
    #[must_use]
    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.nodes.get_mut(id)?.value.as_mut()
    }

    /// Swap the value at an occupied `id`, returning the previous value.
    /// When `id` is out of range or free, nothing is stored and the new
    /// value comes back in the rejection.
    pub fn replace(&mut self, id: usize, value: T) -> Result<T, Rejected<T>> {
        match self.nodes.get_mut(id) {
            Some(node) if node.value.is_some() => {
                let previous = node.value.replace(value);
                Ok(previous.expect("checked occupied"))
            }
            _ => Err(Rejected::new(value, PoolError::NotFound(id))),
        }
    }

    /// Visit occupied slots in ascending id order. Return
    /// `ControlFlow::Break(())` from the callback to stop early.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(usize, &T) -> ControlFlow<()>,
    {
        let Some(last) = self.last_used else {
            return;
        };
        for (id, node) in self.nodes.iter().enumerate().take(last + 1) {
            if let Some(value) = &node.value {
                if f(id, value).is_break() {
                    return;
                }
            }
        }
    }

    /// Recompute every aggregate from scratch and compare (test support).
    #[cfg(test)]
    fn assert_counts_consistent(&self) {
        for n in 0..self.capacity() {
            let span = tree::subtree_span(n);
            let occupied = (n..n + span)
                .filter(|&i| self.nodes[i].value.is_some())
                .count();
            assert_eq!(self.nodes[n].owned as usize, occupied, "node {n}");
        }
        assert_eq!(
            self.live,
            self.nodes.iter().filter(|n| n.value.is_some()).count()
        );
        // The hint must never over-claim.
        for id in 0..self.free_hint {
            assert!(self.nodes[id].value.is_some(), "hint over-claims at {id}");
        }
        if let Some(last) = self.last_used {
            for id in last + 1..self.capacity() {
                assert!(self.nodes[id].value.is_none(), "live slot above last_used");
            }
        } else {
            assert_eq!(self.live, 0);
        }
    }
}
