//! Structural consistency check for a buddy arena
//!
//! Walks the arena from page 0 block by block using head records, and
//! checks the walk against free-list membership.

use core::fmt;

use super::{buddy_arena::BuddyArena, buddy_block::BuddyBlock};

/// First violation found by [`BuddyArena::check_consistency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyError {
    /// The walk reached a page that carries no block order.
    MissingHead { index: usize },
    /// A head records an order outside `MIN_ORDER..=MAX_ORDER`.
    InvalidOrder { index: usize, order: usize },
    /// A block does not start on a multiple of its own size.
    Misaligned { index: usize, order: usize },
    /// A block extends past the end of the arena.
    Overrun { index: usize, order: usize },
    /// A head's free flag disagrees with free-list membership.
    FreeListMismatch { index: usize, order: usize },
    /// Free lists hold entries the walk never reached.
    StrayFreeListEntries { listed: usize, reachable: usize },
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MissingHead { index } => write!(f, "page {} is not a block head", index),
            Self::InvalidOrder { index, order } => {
                write!(f, "page {} has out-of-range order {}", index, order)
            }
            Self::Misaligned { index, order } => {
                write!(f, "block at page {} is misaligned for order {}", index, order)
            }
            Self::Overrun { index, order } => {
                write!(f, "block at page {} of order {} overruns the arena", index, order)
            }
            Self::FreeListMismatch { index, order } => write!(
                f,
                "block at page {} of order {} disagrees with the free lists",
                index, order
            ),
            Self::StrayFreeListEntries { listed, reachable } => write!(
                f,
                "{} free list entries but only {} free blocks reachable",
                listed, reachable
            ),
        }
    }
}

impl core::error::Error for ConsistencyError {}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> BuddyArena<MIN_ORDER, MAX_ORDER> {
    /// Verify that blocks tile the arena and agree with the free lists.
    ///
    /// Checks that the blocks reached by walking head records cover every
    /// page exactly once, that each is aligned to its size, and that a block
    /// is listed (in exactly its own order) iff its head is marked free.
    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        let pages = self.pages();
        let mut index = 0;
        let mut reachable = 0;

        while index < Self::NUM_PAGES {
            let record = pages
                .get(index)
                .ok_or(ConsistencyError::MissingHead { index })?;
            let order = record.order.ok_or(ConsistencyError::MissingHead { index })?;
            if !(MIN_ORDER..=MAX_ORDER).contains(&order) {
                return Err(ConsistencyError::InvalidOrder { index, order });
            }

            let block = BuddyBlock::new(order, index);
            if !block.is_aligned(MIN_ORDER) {
                return Err(ConsistencyError::Misaligned { index, order });
            }
            let span = block.pages(MIN_ORDER);
            if index + span > Self::NUM_PAGES {
                return Err(ConsistencyError::Overrun { index, order });
            }

            let listed_orders = (MIN_ORDER..=MAX_ORDER)
                .filter(|&o| self.is_listed(o, index))
                .count();
            let listed_here = self.is_listed(order, index);
            let agrees = if record.free {
                listed_here && listed_orders == 1
            } else {
                listed_orders == 0
            };
            if !agrees {
                return Err(ConsistencyError::FreeListMismatch { index, order });
            }
            if record.free {
                reachable += 1;
            }

            index += span;
        }

        let listed = self.listed_blocks();
        if listed != reachable {
            return Err(ConsistencyError::StrayFreeListEntries { listed, reachable });
        }
        Ok(())
    }
}
