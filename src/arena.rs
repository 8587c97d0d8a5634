//! Backing byte region for the buddy allocator.
//!
//! The arena is one heap allocation of `2^MAX_ORDER` bytes, aligned to its
//! own size so that a block aligned relative to the arena base is also
//! aligned in absolute address terms.

use alloc::alloc::{alloc_zeroed, dealloc, handle_alloc_error};
use core::alloc::Layout;
use core::ptr::NonNull;

/// Owned, size-aligned byte buffer.
pub struct Arena {
    base: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the arena exclusively owns its buffer; access goes through
// `&self`/`&mut self` like any owned buffer.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    /// Allocate a zeroed arena of `size` bytes aligned to `size`.
    ///
    /// `size` must be a non-zero power of two.
    pub fn new(size: usize) -> Self {
        let layout = match Layout::from_size_align(size, size) {
            Ok(layout) if size != 0 => layout,
            _ => panic!("arena size {:#x} is not a non-zero power of two", size),
        };
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let Some(base) = NonNull::new(ptr) else {
            handle_alloc_error(layout)
        };
        Self { base, layout }
    }

    /// Start address of the arena.
    #[inline]
    pub fn base(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// Length of the arena in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Whether `addr` lies inside `[base, base + size)`.
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base() && addr - self.base() < self.size()
    }

    /// Byte offset of `addr` from the arena base, if inside the arena.
    #[inline]
    pub fn offset_of(&self, addr: usize) -> Option<usize> {
        self.contains(addr).then(|| addr - self.base())
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        if offset.checked_add(len)? > self.size() {
            return None;
        }
        // SAFETY: the range is in bounds and the buffer lives as long as `self`.
        Some(unsafe { core::slice::from_raw_parts(self.base.as_ptr().add(offset), len) })
    }

    /// Mutably borrow `len` bytes starting at `offset`.
    pub fn slice_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        if offset.checked_add(len)? > self.size() {
            return None;
        }
        // SAFETY: the range is in bounds and `&mut self` guarantees exclusivity.
        Some(unsafe { core::slice::from_raw_parts_mut(self.base.as_ptr().add(offset), len) })
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: `base` was returned by `alloc_zeroed` with this exact layout.
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}

impl core::fmt::Debug for Arena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("base", &format_args!("{:#x}", self.base()))
            .field("size", &format_args!("{:#x}", self.size()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_is_self_aligned() {
        let arena = Arena::new(1 << 16);
        assert_eq!(arena.base() & ((1 << 16) - 1), 0);
        assert_eq!(arena.size(), 1 << 16);
    }

    #[test]
    fn test_arena_contains() {
        let arena = Arena::new(0x1000);
        assert!(arena.contains(arena.base()));
        assert!(arena.contains(arena.base() + 0xfff));
        assert!(!arena.contains(arena.base() + 0x1000));
        assert!(!arena.contains(arena.base().wrapping_sub(1)));
        assert_eq!(arena.offset_of(arena.base() + 0x10), Some(0x10));
    }

    #[test]
    fn test_arena_slices() {
        let mut arena = Arena::new(0x1000);
        assert!(arena.slice(0, 0x1000).unwrap().iter().all(|&b| b == 0));
        arena.slice_mut(0x10, 4).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(arena.slice(0x10, 4).unwrap(), &[1, 2, 3, 4]);
        assert!(arena.slice(0xfff, 2).is_none());
        assert!(arena.slice_mut(usize::MAX, 2).is_none());
    }
}
