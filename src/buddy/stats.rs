//! Status reporting and statistics for the buddy arena
//!
//! Provides the per-order status dump, usage counters, and the failure
//! report logged when an allocation cannot be served.

use alloc::vec::Vec;
use core::fmt;

/// Free-block count for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStatus {
    pub order: usize,
    pub free_blocks: usize,
    pub block_size: usize,
}

/// Snapshot of free-block counts for every order, lowest order first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDump {
    orders: Vec<OrderStatus>,
}

impl StatusDump {
    pub(crate) fn new(orders: Vec<OrderStatus>) -> Self {
        Self { orders }
    }

    /// Per-order entries, lowest order first.
    pub fn orders(&self) -> &[OrderStatus] {
        &self.orders
    }

    /// Free-block count at `order`, zero if the order is not tracked.
    pub fn free_blocks(&self, order: usize) -> usize {
        self.orders
            .iter()
            .find(|status| status.order == order)
            .map_or(0, |status| status.free_blocks)
    }

    /// `(order, free_count)` pairs, lowest order first.
    pub fn counts(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.orders.iter().map(|s| (s.order, s.free_blocks))
    }

    /// Total bytes held in free blocks.
    pub fn free_bytes(&self) -> usize {
        self.orders
            .iter()
            .map(|s| s.free_blocks * s.block_size)
            .sum()
    }
}

/// Renders as `count:sizeK` per order, e.g. `1:4K 1:8K 0:16K`.
impl fmt::Display for StatusDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, status) in self.orders.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}K", status.free_blocks, status.block_size / 1024)?;
        }
        Ok(())
    }
}

/// Buddy arena usage statistics
#[cfg(feature = "tracking")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuddyStats {
    pub total_pages: usize,
    pub free_pages: usize,
    pub used_pages: usize,
    /// Successful allocations since the last init.
    pub allocations: usize,
    /// Successful frees since the last init.
    pub frees: usize,
    /// Allocation requests that failed since the last init.
    pub failed_allocations: usize,
    /// Frees rejected as invalid since the last init.
    pub rejected_frees: usize,
}

#[cfg(feature = "tracking")]
impl BuddyStats {
    pub const fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            free_pages: total_pages,
            used_pages: 0,
            allocations: 0,
            frees: 0,
            failed_allocations: 0,
            rejected_frees: 0,
        }
    }

    pub(crate) fn record_alloc(&mut self, pages: usize) {
        self.allocations += 1;
        self.used_pages += pages;
        self.free_pages -= pages;
    }

    pub(crate) fn record_free(&mut self, pages: usize) {
        self.frees += 1;
        self.used_pages -= pages;
        self.free_pages += pages;
    }
}

/// Detailed memory statistics reporter
#[cfg(feature = "tracking")]
pub struct MemoryStatsReporter;

#[cfg(feature = "tracking")]
impl MemoryStatsReporter {
    /// Log the arena state after a failed allocation.
    #[allow(unused_variables)]
    pub fn print_alloc_failure_stats(
        page_size: usize,
        stats: &BuddyStats,
        dump: &StatusDump,
        request_size: usize,
        target_order: usize,
    ) {
        #[cfg(feature = "log")]
        use log::error;
        error!("========================================");
        error!(
            "Request: {} bytes (order {}, {} KB block)",
            request_size,
            target_order,
            (1usize << target_order) / 1024
        );
        error!(
            "  Total pages: {} ({} KB)",
            stats.total_pages,
            (stats.total_pages * page_size) / 1024
        );
        error!(
            "  Free pages: {} ({} KB)",
            stats.free_pages,
            (stats.free_pages * page_size) / 1024
        );
        error!(
            "  Used pages: {} ({} KB)",
            stats.used_pages,
            (stats.used_pages * page_size) / 1024
        );
        error!("  Free blocks by order:");
        for status in dump.orders().iter().rev() {
            if status.free_blocks > 0 {
                error!(
                    "    Order {}: {} blocks ({} KB each, {} KB total)",
                    status.order,
                    status.free_blocks,
                    status.block_size / 1024,
                    (status.free_blocks * status.block_size) / 1024
                );
            }
        }
        error!("========================================");
    }
}
