//! Per-page owner counts.

use alloc::vec;
use alloc::vec::Vec;

/// Dense table of owner counts, one slot per page of the managed range.
///
/// Slots are addressed by page index (see
/// [`PhysicalPageRange::index_of`](kernel_memory_addresses::PhysicalPageRange::index_of)).
/// A count of `1` or more means the page is owned by that many sharers; `0`
/// or less means it is free. Counts are signed because an unchecked double
/// free drives them negative, and a negative count must still read as free.
pub(crate) struct RefCountTable {
    counts: Vec<i32>,
}

impl RefCountTable {
    /// A table of `pages` slots, each starting at `initial`.
    pub(crate) fn new(pages: usize, initial: i32) -> Self {
        Self {
            counts: vec![initial; pages],
        }
    }

    pub(crate) fn get(&self, index: usize) -> i32 {
        self.counts[index]
    }

    /// Add an owner; returns the new count.
    ///
    /// # Panics
    /// If the count would exceed `i32::MAX`.
    pub(crate) fn increment(&mut self, index: usize) -> i32 {
        let count = &mut self.counts[index];
        *count = count
            .checked_add(1)
            .unwrap_or_else(|| panic!("pgref: owner count of page slot {index} overflows"));
        *count
    }

    /// Drop an owner; returns the new count, which may be zero or negative.
    ///
    /// # Panics
    /// If the count would drop below `i32::MIN`.
    pub(crate) fn decrement(&mut self, index: usize) -> i32 {
        let count = &mut self.counts[index];
        *count = count
            .checked_sub(1)
            .unwrap_or_else(|| panic!("kfree: owner count of page slot {index} underflows"));
        *count
    }

    /// Mark the page as freshly allocated with a single owner.
    pub(crate) fn reset_to_one(&mut self, index: usize) {
        self.counts[index] = 1;
    }

    #[cfg(test)]
    pub(crate) const fn len(&self) -> usize {
        self.counts.len()
    }
}
