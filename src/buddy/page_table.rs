//! Per-page metadata records
//!
//! One record per minimum-sized page of the arena. Only the record of a
//! block's head page is authoritative; records of interior pages keep
//! whatever they held last and are never consulted.

use alloc::vec::Vec;

/// Metadata for a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRecord {
    /// Order of the block headed by this page, `None` if never a head or retired.
    pub order: Option<usize>,
    /// Whether the block headed by this page is free.
    ///
    /// `false` only on the head page of a live allocation.
    pub free: bool,
    /// Linear index of this page, fixed at construction.
    pub index: usize,
}

impl PageRecord {
    const fn reset(index: usize) -> Self {
        Self {
            order: None,
            free: true,
            index,
        }
    }
}

/// Table of page records indexed by page number.
pub struct PageTable {
    pages: Vec<PageRecord>,
}

impl PageTable {
    /// Create a table of `num_pages` reset records.
    pub fn new(num_pages: usize) -> Self {
        Self {
            pages: (0..num_pages).map(PageRecord::reset).collect(),
        }
    }

    /// Reset every record to `order = None`, `free = true`.
    pub fn reset(&mut self) {
        for (i, page) in self.pages.iter_mut().enumerate() {
            *page = PageRecord::reset(i);
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PageRecord> {
        self.pages.get(index)
    }

    /// Record `index` as the head of a free block of `order`.
    #[inline]
    pub fn mark_free(&mut self, index: usize, order: usize) {
        let page = &mut self.pages[index];
        page.order = Some(order);
        page.free = true;
    }

    /// Record `index` as the head of an allocated block of `order`.
    #[inline]
    pub fn mark_allocated(&mut self, index: usize, order: usize) {
        let page = &mut self.pages[index];
        page.order = Some(order);
        page.free = false;
    }

    /// Page `index` is no longer a block head.
    #[inline]
    pub fn retire(&mut self, index: usize) {
        let page = &mut self.pages[index];
        page.order = None;
        page.free = true;
    }

    /// Order of the live allocation headed by `index`, if there is one.
    #[inline]
    pub fn allocated_order(&self, index: usize) -> Option<usize> {
        match self.pages.get(index) {
            Some(PageRecord {
                order: Some(order),
                free: false,
                ..
            }) => Some(*order),
            _ => None,
        }
    }
}
