//! Ordered free list for a single block order
//!
//! Holds the head page indices of the free blocks of one order, kept in
//! ascending order so the leftmost block is always at the front.

use alloc::collections::BTreeSet;

#[cfg(feature = "log")]
use log::warn;

/// Free list of one order, sorted ascending by head page index.
#[derive(Debug, Default)]
pub struct FreeList {
    heads: BTreeSet<usize>,
}

impl FreeList {
    /// Create a new empty free list
    pub const fn new() -> Self {
        Self {
            heads: BTreeSet::new(),
        }
    }

    /// Insert a head index. Returns false if it was already present.
    pub fn insert(&mut self, index: usize) -> bool {
        let inserted = self.heads.insert(index);
        if !inserted {
            warn!("free list: page {} already present", index);
        }
        inserted
    }

    /// Remove a head index. Returns false if it was not present.
    pub fn remove(&mut self, index: usize) -> bool {
        self.heads.remove(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.heads.contains(&index)
    }

    /// Pop the lowest head index.
    pub fn pop_lowest(&mut self) -> Option<usize> {
        self.heads.pop_first()
    }

    /// Check if any head index falls within `[start, end)`.
    pub fn has_head_in_range(&self, start: usize, end: usize) -> bool {
        self.heads.range(start..end).next().is_some()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Get the length of the list
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn clear(&mut self) {
        self.heads.clear();
    }

    /// Iterate head indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.heads.iter().copied()
    }
}
