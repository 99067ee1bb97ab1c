//! The heap-extension primitive the allocator kernel is built against.
//!
//! The kernel never talks to an OS or a page table directly; it asks a
//! [`HeapSource`] for more bytes. Separating "the allocator algorithm"
//! from "where the bytes come from" keeps the kernel itself free of
//! any platform code at all, and lets it run identically over a
//! static test arena or a real sbrk-style region.

use core::cell::UnsafeCell;

/// Failure mode of a [`HeapSource`]; currently just exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapSourceError {
    /// The source has no more bytes to hand out.
    OutOfSpace,
}

/// A monotonically growing, sbrk-style memory region.
///
/// # Safety
///
/// Implementors must return a region that stays valid and whose bytes
/// are not aliased elsewhere for as long as the allocator built on top
/// of it is alive. `lo()`/`hi()` must always bound every byte returned
/// by a prior `extend`.
pub unsafe trait HeapSource {
    /// Grows the region by `n` bytes and returns the address at which
    /// the new bytes begin (the region's previous top).
    ///
    /// # Errors
    ///
    /// Returns [`HeapSourceError::OutOfSpace`] if the region cannot
    /// grow by `n` bytes.
    unsafe fn extend(&mut self, n: usize) -> Result<*mut u8, HeapSourceError>;

    /// Lowest address ever handed out by this source.
    fn lo(&self) -> *const u8;

    /// Highest valid byte currently backing this source.
    fn hi(&self) -> *const u8;
}

/// A fixed-capacity, statically allocated sbrk-style region.
///
/// This is the `no_std` stand-in for a process brk-extendable heap: a
/// single static array that hands out prefixes of itself on request
/// and never shrinks. `CAP` bounds the total size the allocator built
/// on top of it can ever grow to.
#[repr(C, align(16))]
pub struct SbrkArena<const CAP: usize> {
    bytes: UnsafeCell<[u8; CAP]>,
    top: usize,
}

impl<const CAP: usize> SbrkArena<CAP> {
    /// Creates a new, empty arena. No bytes are handed out until the
    /// first [`HeapSource::extend`] call.
    pub const fn new() -> Self {
        Self {
            bytes: UnsafeCell::new([0; CAP]),
            top: 0,
        }
    }

    fn base(&self) -> *mut u8 {
        self.bytes.get().cast()
    }
}

impl<const CAP: usize> Default for SbrkArena<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the arena is only ever mutated through `&mut self`, serialized
// by whatever wraps it (e.g. `LockedHeap`'s `spin::Mutex`); there is no
// concurrent access to the raw bytes.
unsafe impl<const CAP: usize> Sync for SbrkArena<CAP> {}
unsafe impl<const CAP: usize> Send for SbrkArena<CAP> {}

unsafe impl<const CAP: usize> HeapSource for SbrkArena<CAP> {
    unsafe fn extend(&mut self, n: usize) -> Result<*mut u8, HeapSourceError> {
        if n > CAP - self.top {
            return Err(HeapSourceError::OutOfSpace);
        }
        let addr = self.base().add(self.top);
        self.top += n;
        Ok(addr)
    }

    fn lo(&self) -> *const u8 {
        self.base()
    }

    fn hi(&self) -> *const u8 {
        if self.top == 0 {
            self.base()
        } else {
            unsafe { self.base().add(self.top - 1) }
        }
    }
}
