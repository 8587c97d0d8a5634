//! Fixed-arena buddy allocator
//!
//! Implements the buddy system over a single owned arena of `2^MAX_ORDER`
//! bytes, using a page table for head-page metadata and one ordered free
//! list per order.

use alloc::vec::Vec;
use core::alloc::Layout;
use core::ptr::NonNull;

use crate::arena::Arena;
use crate::{
    is_aligned, order_of, AllocError, AllocResult, ByteAllocator, DEFAULT_MAX_ORDER,
    DEFAULT_MIN_ORDER,
};

#[cfg(feature = "log")]
use log::{debug, info, trace, warn};

use super::{
    buddy_block::BuddyBlock,
    free_list::FreeList,
    page_table::PageTable,
    stats::{OrderStatus, StatusDump},
};

#[cfg(feature = "tracking")]
use super::stats::{BuddyStats, MemoryStatsReporter};

/// Buddy allocator over a fixed arena of `2^MAX_ORDER` bytes.
///
/// Blocks range from one page (`2^MIN_ORDER` bytes) to the whole arena.
/// Every operation takes `&mut self`; wrap the arena in
/// [`LockedBuddyArena`](crate::LockedBuddyArena) to share it.
pub struct BuddyArena<
    const MIN_ORDER: usize = { DEFAULT_MIN_ORDER },
    const MAX_ORDER: usize = { DEFAULT_MAX_ORDER },
> {
    arena: Arena,
    pages: PageTable,
    /// Free lists for each order, indexed by `order - MIN_ORDER`
    free_lists: Vec<FreeList>,
    #[cfg(feature = "tracking")]
    stats: BuddyStats,
}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> BuddyArena<MIN_ORDER, MAX_ORDER> {
    /// Size of one page, the smallest block handed out.
    pub const PAGE_SIZE: usize = 1 << MIN_ORDER;
    /// Size of the whole arena, the largest block.
    pub const ARENA_SIZE: usize = 1 << MAX_ORDER;
    /// Number of pages in the arena.
    pub const NUM_PAGES: usize = 1 << (MAX_ORDER - MIN_ORDER);
    /// Number of tracked orders, `MIN_ORDER..=MAX_ORDER`.
    pub const NUM_ORDERS: usize = MAX_ORDER - MIN_ORDER + 1;

    const VALID_ORDERS: () = assert!(
        MIN_ORDER <= MAX_ORDER && MAX_ORDER < usize::BITS as usize - 1,
        "MIN_ORDER must not exceed MAX_ORDER, and the arena must fit the address space"
    );

    /// Create an arena holding a single free block of order `MAX_ORDER`.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_ORDERS;

        let mut this = Self {
            arena: Arena::new(Self::ARENA_SIZE),
            pages: PageTable::new(Self::NUM_PAGES),
            free_lists: (0..Self::NUM_ORDERS).map(|_| FreeList::new()).collect(),
            #[cfg(feature = "tracking")]
            stats: BuddyStats::new(Self::NUM_PAGES),
        };
        this.init();
        this
    }

    /// Reset to a single free block covering the whole arena.
    ///
    /// Every outstanding allocation is forgotten.
    pub fn init(&mut self) {
        self.pages.reset();

        // Reset free lists
        for list in &mut self.free_lists {
            list.clear();
        }

        self.pages.mark_free(0, MAX_ORDER);
        self.free_list_mut(MAX_ORDER).insert(0);

        #[cfg(feature = "tracking")]
        {
            self.stats = BuddyStats::new(Self::NUM_PAGES);
        }

        debug!(
            "buddy arena: init [{:#x}, {:#x}) pages={} orders={}..={}",
            self.base(),
            self.base() + Self::ARENA_SIZE,
            Self::NUM_PAGES,
            MIN_ORDER,
            MAX_ORDER
        );
    }

    #[inline]
    fn free_list(&self, order: usize) -> &FreeList {
        &self.free_lists[order - MIN_ORDER]
    }

    #[inline]
    fn free_list_mut(&mut self, order: usize) -> &mut FreeList {
        &mut self.free_lists[order - MIN_ORDER]
    }

    /// Start address of the arena.
    pub fn base(&self) -> usize {
        self.arena.base()
    }

    /// Whether `addr` lies inside the arena.
    pub fn contains(&self, addr: usize) -> bool {
        self.arena.contains(addr)
    }

    /// Page index containing `addr`.
    pub fn page_index(&self, addr: usize) -> Option<usize> {
        self.arena.offset_of(addr).map(|offset| offset >> MIN_ORDER)
    }

    /// Address of the page with the given index.
    pub fn page_addr(&self, index: usize) -> Option<usize> {
        (index < Self::NUM_PAGES).then(|| self.base() + (index << MIN_ORDER))
    }

    #[inline]
    fn block_addr(&self, block: BuddyBlock) -> usize {
        self.base() + block.offset(MIN_ORDER)
    }

    /// Order needed to serve `size` bytes: at least one page, at most the arena.
    fn target_order(size: usize) -> AllocResult<usize> {
        if size == 0 {
            return Err(AllocError::InvalidParam);
        }
        let order = order_of(size).ok_or(AllocError::SizeTooLarge)?.max(MIN_ORDER);
        if order > MAX_ORDER {
            return Err(AllocError::SizeTooLarge);
        }
        Ok(order)
    }

    /// Allocate a block of at least `size` bytes.
    ///
    /// Returns the block's address, aligned to the block size. The block is
    /// the leftmost free block of the smallest sufficient order, splitting a
    /// larger block if no exact fit is free.
    pub fn allocate(&mut self, size: usize) -> AllocResult<usize> {
        self.allocate_order_for(size, size)
    }

    /// Allocate a block satisfying both the size and alignment of `layout`.
    pub fn allocate_layout(&mut self, layout: Layout) -> AllocResult<usize> {
        self.allocate_order_for(layout.size().max(layout.align()), layout.size())
    }

    fn allocate_order_for(&mut self, order_size: usize, request_size: usize) -> AllocResult<usize> {
        let result = Self::target_order(order_size).and_then(|order| self.alloc_order(order));
        match result {
            Ok(block) => Ok(self.block_addr(block)),
            Err(err) => {
                debug!(
                    "buddy arena: allocation failure: {} bytes: {:?}",
                    request_size, err
                );
                #[cfg(feature = "tracking")]
                {
                    self.stats.failed_allocations += 1;
                    if err.is_out_of_memory() {
                        let target = order_of(order_size).unwrap_or(usize::BITS as usize - 1);
                        MemoryStatsReporter::print_alloc_failure_stats(
                            Self::PAGE_SIZE,
                            &self.stats,
                            &self.dump(),
                            request_size,
                            target.max(MIN_ORDER),
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Take a free block of exactly `target` order, splitting larger ones.
    fn alloc_order(&mut self, target: usize) -> AllocResult<BuddyBlock> {
        let found = (target..=MAX_ORDER)
            .find(|&order| !self.free_list(order).is_empty())
            .ok_or(AllocError::OutOfMemory)?;
        let index = self
            .free_list_mut(found)
            .pop_lowest()
            .ok_or(AllocError::OutOfMemory)?;

        // Split down to the target order. The left half keeps the head and is
        // split further; every right half is pushed to its (previously empty)
        // free list.
        let mut block = BuddyBlock::new(found, index);
        while block.order > target {
            let (left, right) = block.split(MIN_ORDER);
            self.pages.mark_free(left.index, left.order);
            self.pages.mark_free(right.index, right.order);
            self.free_list_mut(right.order).insert(right.index);
            trace!(
                "buddy arena: split page {} order {} -> pages {}, {} order {}",
                block.index,
                block.order,
                left.index,
                right.index,
                left.order
            );
            block = left;
        }

        self.pages.mark_allocated(block.index, block.order);
        #[cfg(feature = "tracking")]
        self.stats.record_alloc(block.pages(MIN_ORDER));
        Ok(block)
    }

    /// The live allocation starting at `addr`, if any.
    fn allocated_block(&self, addr: usize) -> Option<BuddyBlock> {
        let offset = self.arena.offset_of(addr)?;
        if !is_aligned(offset, Self::PAGE_SIZE) {
            return None;
        }
        let index = offset >> MIN_ORDER;
        let order = self.pages.allocated_order(index)?;
        Some(BuddyBlock::new(order, index))
    }

    /// Return the block at `addr` to the arena, merging with free buddies.
    ///
    /// Fails with [`AllocError::InvalidFree`] and leaves the arena untouched
    /// if `addr` is not the start of a live allocation.
    pub fn free(&mut self, addr: usize) -> AllocResult {
        let Some(freed) = self.allocated_block(addr) else {
            warn!("buddy arena: invalid free of {:#x}", addr);
            #[cfg(feature = "tracking")]
            {
                self.stats.rejected_frees += 1;
            }
            return Err(AllocError::InvalidFree);
        };

        let end = freed.index + freed.pages(MIN_ORDER);
        debug_assert!(
            (MIN_ORDER..freed.order)
                .all(|order| !self.free_list(order).has_head_in_range(freed.index, end)),
            "buddy arena: free block nested in live allocation at page {}",
            freed.index
        );
        self.pages.mark_free(freed.index, freed.order);

        let mut block = freed;
        while block.order < MAX_ORDER {
            let buddy = block.buddy_index(MIN_ORDER);
            if !self.free_list_mut(block.order).remove(buddy) {
                break;
            }
            // The higher of the two heads is now interior to the merged block.
            self.pages.retire(block.index.max(buddy));
            trace!(
                "buddy arena: merge pages {} and {} at order {}",
                block.index,
                buddy,
                block.order
            );
            block = block.parent(MIN_ORDER);
        }

        self.pages.mark_free(block.index, block.order);
        self.free_list_mut(block.order).insert(block.index);

        #[cfg(feature = "tracking")]
        self.stats.record_free(freed.pages(MIN_ORDER));
        Ok(())
    }

    /// Order of the live allocation starting at `addr`.
    pub fn block_order(&self, addr: usize) -> AllocResult<usize> {
        self.allocated_block(addr)
            .map(|block| block.order)
            .ok_or(AllocError::InvalidFree)
    }

    /// Size in bytes of the live allocation starting at `addr`.
    pub fn block_size(&self, addr: usize) -> AllocResult<usize> {
        self.block_order(addr).map(|order| 1 << order)
    }

    /// Bytes of the live allocation starting at `addr`.
    pub fn block(&self, addr: usize) -> AllocResult<&[u8]> {
        let block = self.allocated_block(addr).ok_or(AllocError::InvalidFree)?;
        self.arena
            .slice(block.offset(MIN_ORDER), 1 << block.order)
            .ok_or(AllocError::InvalidFree)
    }

    /// Mutable bytes of the live allocation starting at `addr`.
    pub fn block_mut(&mut self, addr: usize) -> AllocResult<&mut [u8]> {
        let block = self.allocated_block(addr).ok_or(AllocError::InvalidFree)?;
        self.arena
            .slice_mut(block.offset(MIN_ORDER), 1 << block.order)
            .ok_or(AllocError::InvalidFree)
    }

    /// Free-block count and block size for every order, lowest first.
    pub fn dump(&self) -> StatusDump {
        StatusDump::new(
            (MIN_ORDER..=MAX_ORDER)
                .map(|order| OrderStatus {
                    order,
                    free_blocks: self.free_list(order).len(),
                    block_size: 1 << order,
                })
                .collect(),
        )
    }

    /// Log the status dump.
    pub fn print_status(&self) {
        info!("buddy arena [{:#x}]: {}", self.base(), self.dump());
    }

    /// Head page indices of the free blocks of `order`, ascending.
    ///
    /// Empty if `order` is outside `MIN_ORDER..=MAX_ORDER`.
    pub fn free_blocks(&self, order: usize) -> impl Iterator<Item = usize> + '_ {
        self.free_lists
            .get(order.wrapping_sub(MIN_ORDER))
            .into_iter()
            .flat_map(FreeList::iter)
    }

    /// Bytes currently held in free blocks.
    pub fn free_bytes(&self) -> usize {
        (MIN_ORDER..=MAX_ORDER)
            .map(|order| self.free_list(order).len() << order)
            .sum()
    }

    /// Bytes currently handed out, including rounding to block size.
    pub fn used_bytes(&self) -> usize {
        Self::ARENA_SIZE - self.free_bytes()
    }

    #[cfg(feature = "tracking")]
    pub fn stats(&self) -> BuddyStats {
        self.stats
    }

    pub(super) fn pages(&self) -> &PageTable {
        &self.pages
    }

    pub(super) fn is_listed(&self, order: usize, index: usize) -> bool {
        self.free_list(order).contains(index)
    }

    pub(super) fn listed_blocks(&self) -> usize {
        self.free_lists.iter().map(FreeList::len).sum()
    }
}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> Default for BuddyArena<MIN_ORDER, MAX_ORDER> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> core::fmt::Debug
    for BuddyArena<MIN_ORDER, MAX_ORDER>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BuddyArena")
            .field("arena", &self.arena)
            .field("min_order", &MIN_ORDER)
            .field("max_order", &MAX_ORDER)
            .field("free_bytes", &self.free_bytes())
            .finish()
    }
}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> ByteAllocator
    for BuddyArena<MIN_ORDER, MAX_ORDER>
{
    fn alloc(&mut self, layout: Layout) -> AllocResult<NonNull<u8>> {
        let addr = self.allocate_layout(layout)?;
        NonNull::new(addr as *mut u8).ok_or(AllocError::OutOfMemory)
    }

    fn dealloc(&mut self, pos: NonNull<u8>, layout: Layout) {
        if let Err(err) = self.free(pos.as_ptr() as usize) {
            warn!(
                "buddy arena: dealloc {:p} with layout {:?} failed: {}",
                pos, layout, err
            );
        }
    }

    fn total_bytes(&self) -> usize {
        Self::ARENA_SIZE
    }

    fn used_bytes(&self) -> usize {
        BuddyArena::used_bytes(self)
    }

    fn available_bytes(&self) -> usize {
        self.free_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    type Arena1M = BuddyArena<12, 20>;
    type SmallArena = BuddyArena<12, 15>;

    #[test]
    fn test_init_single_block() {
        let arena = Arena1M::new();
        let dump = arena.dump();
        assert_eq!(dump.orders().len(), 9);
        assert_eq!(dump.free_blocks(20), 1);
        for order in 12..20 {
            assert_eq!(dump.free_blocks(order), 0);
        }
        assert_eq!(arena.free_bytes(), 1 << 20);
        assert_eq!(arena.base() & ((1 << 20) - 1), 0);
    }

    #[test]
    fn test_small_request_takes_one_page() {
        let mut arena = Arena1M::new();
        let addr = arena.allocate(1).unwrap();
        assert_eq!(addr, arena.base());
        assert_eq!(arena.block_order(addr), Ok(12));
        assert_eq!(arena.block_size(addr), Ok(4096));
        assert_eq!(arena.used_bytes(), 4096);
    }

    #[test]
    fn test_target_order_clamps_and_rounds() {
        assert_eq!(Arena1M::target_order(1), Ok(12));
        assert_eq!(Arena1M::target_order(4096), Ok(12));
        assert_eq!(Arena1M::target_order(4097), Ok(13));
        assert_eq!(Arena1M::target_order(1 << 20), Ok(20));
        assert_eq!(Arena1M::target_order((1 << 20) + 1), Err(AllocError::SizeTooLarge));
        assert_eq!(Arena1M::target_order(usize::MAX), Err(AllocError::SizeTooLarge));
        assert_eq!(Arena1M::target_order(0), Err(AllocError::InvalidParam));
    }

    #[test]
    fn test_leftmost_first() {
        let mut arena = SmallArena::new();
        let a = arena.allocate(4096).unwrap();
        let b = arena.allocate(4096).unwrap();
        let c = arena.allocate(4096).unwrap();
        assert_eq!(a, arena.base());
        assert_eq!(b, arena.base() + 0x1000);
        assert_eq!(c, arena.base() + 0x2000);

        arena.free(a).unwrap();
        assert_eq!(arena.allocate(100).unwrap(), a);
    }

    #[test]
    fn test_exact_fit_uses_existing_block() {
        let mut arena = SmallArena::new();
        let a = arena.allocate(4096).unwrap();
        // Page 1 is free at order 12; the next page request must not split.
        let before = arena.dump();
        let b = arena.allocate(4096).unwrap();
        assert_eq!(b, a + 4096);
        let after = arena.dump();
        assert_eq!(after.free_blocks(12), before.free_blocks(12) - 1);
        assert_eq!(after.free_blocks(13), before.free_blocks(13));
    }

    #[test]
    fn test_free_merges_up_to_max_order() {
        let mut arena = SmallArena::new();
        let addrs: Vec<usize> = (0..8).map(|_| arena.allocate(4096).unwrap()).collect();
        assert_eq!(arena.allocate(1), Err(AllocError::OutOfMemory));
        for addr in addrs.iter().rev() {
            arena.free(*addr).unwrap();
        }
        assert_eq!(arena.dump().counts().collect::<Vec<_>>(), [(12, 0), (13, 0), (14, 0), (15, 1)]);
    }

    #[test]
    fn test_invalid_free_rejected() {
        let mut arena = SmallArena::new();
        let addr = arena.allocate(8192).unwrap();
        let snapshot = arena.dump();

        // Interior page of a live block.
        assert_eq!(arena.free(addr + 4096), Err(AllocError::InvalidFree));
        // Not page aligned.
        assert_eq!(arena.free(addr + 1), Err(AllocError::InvalidFree));
        // Outside the arena.
        assert_eq!(arena.free(arena.base() + (1 << 15)), Err(AllocError::InvalidFree));
        // Head of a free block.
        assert_eq!(arena.free(arena.base() + 8192), Err(AllocError::InvalidFree));
        assert_eq!(arena.dump(), snapshot);

        arena.free(addr).unwrap();
        // Double free.
        assert_eq!(arena.free(addr), Err(AllocError::InvalidFree));
        assert_eq!(arena.dump().free_blocks(15), 1);
    }

    #[test]
    fn test_freed_page_is_not_accepted_after_merge() {
        let mut arena = SmallArena::new();
        let a = arena.allocate(4096).unwrap();
        let b = arena.allocate(4096).unwrap();
        arena.free(b).unwrap();
        arena.free(a).unwrap();
        // Whole arena allocated as one block: page `b` is now interior.
        let whole = arena.allocate(1 << 15).unwrap();
        assert_eq!(whole, a);
        assert_eq!(arena.free(b), Err(AllocError::InvalidFree));
        arena.free(whole).unwrap();
    }

    #[test]
    fn test_layout_alignment_raises_order() {
        let mut arena = SmallArena::new();
        let _first = arena.allocate(4096).unwrap();
        let layout = Layout::from_size_align(16, 4 * 4096).unwrap();
        let addr = arena.allocate_layout(layout).unwrap();
        assert!(is_aligned(addr, 4 * 4096));
        assert_eq!(arena.block_order(addr), Ok(14));
    }

    #[test]
    fn test_block_memory_access() {
        let mut arena = SmallArena::new();
        let addr = arena.allocate(5000).unwrap();
        let block = arena.block_mut(addr).unwrap();
        assert_eq!(block.len(), 8192);
        block.fill(0xab);
        assert!(arena.block(addr).unwrap().iter().all(|&b| b == 0xab));
        assert_eq!(arena.block(addr + 4096).err(), Some(AllocError::InvalidFree));
    }

    #[test]
    fn test_byte_allocator_trait() {
        let mut arena = SmallArena::new();
        let layout = Layout::from_size_align(64, 8).unwrap();
        let ptr = ByteAllocator::alloc(&mut arena, layout).unwrap();
        assert_eq!(arena.total_bytes(), 1 << 15);
        assert_eq!(ByteAllocator::used_bytes(&arena), 4096);
        assert_eq!(arena.available_bytes(), (1 << 15) - 4096);
        ByteAllocator::dealloc(&mut arena, ptr, layout);
        assert_eq!(ByteAllocator::used_bytes(&arena), 0);
    }

    #[test]
    fn test_free_blocks_iter() {
        let mut arena = SmallArena::new();
        arena.allocate(1).unwrap();
        assert_eq!(arena.free_blocks(12).collect::<Vec<_>>(), vec![1]);
        assert_eq!(arena.free_blocks(13).collect::<Vec<_>>(), vec![2]);
        assert_eq!(arena.free_blocks(14).collect::<Vec<_>>(), vec![4]);
        assert_eq!(arena.free_blocks(3).count(), 0);
        assert_eq!(arena.free_blocks(16).count(), 0);
    }

    #[test]
    fn test_page_addressing() {
        let arena = SmallArena::new();
        assert_eq!(arena.page_addr(3), Some(arena.base() + 3 * 4096));
        assert_eq!(arena.page_addr(8), None);
        assert_eq!(arena.page_index(arena.base() + 3 * 4096 + 17), Some(3));
        assert_eq!(arena.page_index(arena.base() + (1 << 15)), None);
        assert!(arena.contains(arena.base()));
    }

    #[cfg(feature = "tracking")]
    #[test]
    fn test_stats_follow_operations() {
        let mut arena = SmallArena::new();
        let a = arena.allocate(8192).unwrap();
        assert_eq!(arena.allocate(1 << 16), Err(AllocError::SizeTooLarge));
        assert_eq!(arena.free(a + 1), Err(AllocError::InvalidFree));
        let stats = arena.stats();
        assert_eq!(stats.total_pages, 8);
        assert_eq!(stats.used_pages, 2);
        assert_eq!(stats.free_pages, 6);
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.failed_allocations, 1);
        assert_eq!(stats.rejected_frees, 1);
        arena.free(a).unwrap();
        assert_eq!(arena.stats().used_pages, 0);
        arena.init();
        assert_eq!(arena.stats(), BuddyStats::new(8));
    }
}
