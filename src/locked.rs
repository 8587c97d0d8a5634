//! Lock-guarded buddy arena.
//!
//! The buddy core is single-owner. This wrapper puts one spin lock in front
//! of every call so that several callers can share an arena.

use kspin::SpinNoIrq;

use crate::buddy::{BuddyArena, StatusDump};
use crate::{AllocResult, DEFAULT_MAX_ORDER, DEFAULT_MIN_ORDER};

/// A [`BuddyArena`] behind a single `SpinNoIrq` lock.
pub struct LockedBuddyArena<
    const MIN_ORDER: usize = { DEFAULT_MIN_ORDER },
    const MAX_ORDER: usize = { DEFAULT_MAX_ORDER },
> {
    inner: SpinNoIrq<BuddyArena<MIN_ORDER, MAX_ORDER>>,
}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> LockedBuddyArena<MIN_ORDER, MAX_ORDER> {
    pub fn new() -> Self {
        Self::from_arena(BuddyArena::new())
    }

    pub fn from_arena(arena: BuddyArena<MIN_ORDER, MAX_ORDER>) -> Self {
        Self {
            inner: SpinNoIrq::new(arena),
        }
    }

    /// Reset the arena to a single free block.
    pub fn init(&self) {
        self.inner.lock().init();
    }

    pub fn allocate(&self, size: usize) -> AllocResult<usize> {
        self.inner.lock().allocate(size)
    }

    pub fn free(&self, addr: usize) -> AllocResult {
        self.inner.lock().free(addr)
    }

    pub fn dump(&self) -> StatusDump {
        self.inner.lock().dump()
    }

    /// Run `f` with exclusive access to the arena.
    ///
    /// Use this to group several operations under one lock acquisition.
    pub fn with<R>(&self, f: impl FnOnce(&mut BuddyArena<MIN_ORDER, MAX_ORDER>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<const MIN_ORDER: usize, const MAX_ORDER: usize> Default
    for LockedBuddyArena<MIN_ORDER, MAX_ORDER>
{
    fn default() -> Self {
        Self::new()
    }
}
