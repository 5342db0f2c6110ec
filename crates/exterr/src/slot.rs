//! Per-context diagnostic slot
//!
//! Each execution context holds at most one pending extended code. The slot
//! is `!Sync`: only its owner ever reads or writes it, so no locking.
//!
//! Threads get one implicitly through thread-local storage
//! ([`with_current`]); runtimes that multiplex tasks over threads can keep a
//! [`DiagSlot`] in their own task context and pass it explicitly.

use core::cell::Cell;
use core::num::NonZeroU32;

/// Holds the magnitude of the last unretrieved extended code.
#[derive(Debug, Default)]
pub struct DiagSlot {
    pending: Cell<Option<NonZeroU32>>,
}

impl DiagSlot {
    pub const fn new() -> Self {
        Self { pending: Cell::new(None) }
    }

    /// Record `magnitude`, replacing any unretrieved value. Zero clears.
    #[inline]
    pub fn set(&self, magnitude: u32) {
        self.pending.set(NonZeroU32::new(magnitude));
    }

    /// Pending magnitude, if any. Does not clear.
    #[inline]
    pub fn get(&self) -> Option<u32> {
        self.pending.get().map(NonZeroU32::get)
    }

    #[inline]
    pub fn clear(&self) {
        self.pending.set(None);
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

thread_local! {
    /// Slot of the current OS thread
    static CURRENT: DiagSlot = const { DiagSlot::new() };
}

/// Run `f` with the current thread's slot.
#[inline]
pub fn with_current<R>(f: impl FnOnce(&DiagSlot) -> R) -> R {
    CURRENT.with(f)
}

/// Pending magnitude of the current thread, if any.
#[inline]
pub fn current_pending() -> Option<u32> {
    CURRENT.with(DiagSlot::get)
}

/// Drop the current thread's pending diagnostic without reading it.
#[inline]
pub fn clear_current() {
    CURRENT.with(DiagSlot::clear)
}
