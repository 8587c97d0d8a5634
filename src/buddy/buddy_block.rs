//! Buddy block metadata
//!
//! Represents a block of the arena by its order and head page index.

use core::cmp::Ordering;

/// Buddy block metadata
///
/// `index` is the page index of the block's head page, relative to the arena
/// base. A block of order `o` spans `2^(o - min_order)` pages.
#[derive(Debug, Clone, Copy)]
pub struct BuddyBlock {
    pub order: usize,
    pub index: usize,
}

impl BuddyBlock {
    /// Create a new buddy block
    pub const fn new(order: usize, index: usize) -> Self {
        Self { order, index }
    }

    /// Number of pages covered by this block.
    #[inline]
    pub const fn pages(&self, min_order: usize) -> usize {
        1 << (self.order - min_order)
    }

    /// Byte offset of this block from the arena base.
    #[inline]
    pub const fn offset(&self, min_order: usize) -> usize {
        self.index << min_order
    }

    /// Head page index of this block's buddy.
    ///
    /// For a block of order k at byte offset d, the buddy is at d ^ 2^k,
    /// which in page units is index ^ 2^(k - min_order).
    #[inline]
    pub const fn buddy_index(&self, min_order: usize) -> usize {
        self.index ^ self.pages(min_order)
    }

    /// The buddy block: same order, complementary address bit.
    #[inline]
    pub const fn buddy(&self, min_order: usize) -> Self {
        Self::new(self.order, self.buddy_index(min_order))
    }

    /// Split into two halves of order `order - 1`, left half first.
    #[inline]
    pub const fn split(&self, min_order: usize) -> (Self, Self) {
        let half = Self::new(self.order - 1, self.index);
        (half, half.buddy(min_order))
    }

    /// The parent block formed by merging this block with its buddy.
    #[inline]
    pub const fn parent(&self, min_order: usize) -> Self {
        let buddy = self.buddy_index(min_order);
        let index = if buddy < self.index { buddy } else { self.index };
        Self::new(self.order + 1, index)
    }

    /// Whether the block starts on a multiple of its own size.
    #[inline]
    pub const fn is_aligned(&self, min_order: usize) -> bool {
        self.index & (self.pages(min_order) - 1) == 0
    }
}

impl PartialOrd for BuddyBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.index.partial_cmp(&other.index)
    }
}

impl PartialEq for BuddyBlock {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.order == other.order
    }
}

impl Eq for BuddyBlock {}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: usize = 12;

    #[test]
    fn test_buddy_of_page_blocks() {
        assert_eq!(BuddyBlock::new(12, 0).buddy_index(MIN), 1);
        assert_eq!(BuddyBlock::new(12, 1).buddy_index(MIN), 0);
        assert_eq!(BuddyBlock::new(13, 2).buddy_index(MIN), 0);
        assert_eq!(BuddyBlock::new(14, 4).buddy_index(MIN), 0);
        // Pages 1 and 2 are neighbours but not buddies.
        assert_ne!(BuddyBlock::new(12, 1).buddy_index(MIN), 2);
    }

    #[test]
    fn test_split_and_parent() {
        let block = BuddyBlock::new(15, 8);
        let (left, right) = block.split(MIN);
        assert_eq!(left, BuddyBlock::new(14, 8));
        assert_eq!(right, BuddyBlock::new(14, 12));
        assert_eq!(left.parent(MIN), block);
        assert_eq!(right.parent(MIN), block);
    }

    #[test]
    fn test_alignment() {
        assert!(BuddyBlock::new(14, 4).is_aligned(MIN));
        assert!(!BuddyBlock::new(14, 2).is_aligned(MIN));
        assert!(BuddyBlock::new(12, 7).is_aligned(MIN));
        assert_eq!(BuddyBlock::new(13, 6).offset(MIN), 6 * 4096);
    }
}
