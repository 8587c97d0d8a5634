//! Buddy Arena Allocator
//!
//! A fixed-arena buddy allocator. One contiguous region of `2^MAX_ORDER`
//! bytes is carved into power-of-two blocks that are split on allocation
//! and coalesced with their buddies on free. It features:
//! - Per-page metadata records for block heads
//! - Per-order ordered free lists keyed by head page index
//! - Leftmost-first, deterministic block selection
//! - Status dump and consistency checking
//! - An optional spin-lock wrapper for shared access

#![no_std]

extern crate alloc;

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Default minimum block order (4 KiB pages).
pub const DEFAULT_MIN_ORDER: usize = 12;

/// Default maximum block order (1 MiB arena).
pub const DEFAULT_MAX_ORDER: usize = 20;

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Invalid `size` or alignment. (e.g. zero-sized request)
    InvalidParam,
    /// No free block of sufficient order exists.
    OutOfMemory,
    /// The request is larger than the whole arena.
    SizeTooLarge,
    /// Deallocate an address that is not a live allocation.
    InvalidFree,
}

impl AllocError {
    /// Whether this error means the arena could not satisfy the request.
    ///
    /// `SizeTooLarge` is reported as its own variant but counts as an
    /// out-of-memory condition.
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory | Self::SizeTooLarge)
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParam => f.write_str("invalid allocation parameter"),
            Self::OutOfMemory => f.write_str("out of memory"),
            Self::SizeTooLarge => f.write_str("requested size exceeds the arena"),
            Self::InvalidFree => f.write_str("address is not a live allocation"),
        }
    }
}

impl core::error::Error for AllocError {}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// Byte-granularity allocator.
pub trait ByteAllocator {
    /// Allocate memory with the given size (in bytes) and alignment.
    fn alloc(&mut self, layout: Layout) -> AllocResult<NonNull<u8>>;

    /// Deallocate memory at the given position, size, and alignment.
    fn dealloc(&mut self, pos: NonNull<u8>, layout: Layout);

    /// Returns total memory size in bytes.
    fn total_bytes(&self) -> usize;

    /// Returns allocated memory size in bytes.
    fn used_bytes(&self) -> usize;

    /// Returns available memory size in bytes.
    fn available_bytes(&self) -> usize;
}

/// Checks whether the address has the demanded alignment.
///
/// Equivalent to `addr % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(base_addr: usize, align: usize) -> bool {
    base_addr & (align - 1) == 0
}

/// Smallest order `o` with `2^o >= size`, or `None` if it does not fit a word.
#[inline]
const fn order_of(size: usize) -> Option<usize> {
    match size.checked_next_power_of_two() {
        Some(v) => Some(v.trailing_zeros() as usize),
        None => None,
    }
}

mod arena;
pub use arena::Arena;

pub mod buddy;
#[cfg(feature = "tracking")]
pub use buddy::BuddyStats;
pub use buddy::{BuddyArena, BuddyBlock, ConsistencyError, OrderStatus, StatusDump};

pub mod locked;
pub use locked::LockedBuddyArena;
