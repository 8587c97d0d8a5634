//! Buddy arena allocator module
//!
//! This module provides the buddy system over a single fixed arena:
//! - Page table of head-page metadata
//! - Ordered per-order free lists for leftmost-first allocation
//! - Status dump, statistics and consistency checking

pub mod buddy_arena;
pub mod buddy_block;
pub mod consistency;
pub mod free_list;
pub mod page_table;
pub mod stats;

pub use buddy_arena::BuddyArena;
pub use buddy_block::BuddyBlock;
pub use consistency::ConsistencyError;
pub use free_list::FreeList;
pub use page_table::{PageRecord, PageTable};
#[cfg(feature = "tracking")]
pub use stats::BuddyStats;
pub use stats::{OrderStatus, StatusDump};
