//! Lazily initialized global allocator, for crates that want a
//! `static`-backed `#[global_allocator]` without sizing a [`SbrkArena`]
//! by hand at the call site.
//!
//! A `conquer_once::spin::OnceCell` guards first-use construction of
//! the arena and lock, and the zero-sized `GlobalAlloc` wrapper just
//! reads through the cell on every call, so the `static` itself can be
//! declared `const`-initialized before any arena bytes exist.

use core::alloc::{GlobalAlloc, Layout};

use conquer_once::spin::OnceCell;

use crate::mem::api::LockedHeap;
use crate::mem::source::SbrkArena;

/// A `#[global_allocator]`-ready allocator backed by a `CAP`-byte
/// static arena, constructed on first use.
pub struct GlobalHeap<const CAP: usize> {
    cell: OnceCell<LockedHeap<SbrkArena<CAP>>>,
}

impl<const CAP: usize> GlobalHeap<CAP> {
    /// An uninitialized global heap. No bytes are reserved until the
    /// first allocation.
    pub const fn uninit() -> Self {
        Self {
            cell: OnceCell::uninit(),
        }
    }

    fn heap(&self) -> &LockedHeap<SbrkArena<CAP>> {
        self.cell
            .get_or_init(|| LockedHeap::new(SbrkArena::new()))
    }

    /// Runs the consistency checker against the underlying heap.
    pub fn check(&self, line_hint: i32) -> bool {
        self.heap().check(line_hint)
    }
}

unsafe impl<const CAP: usize> GlobalAlloc for GlobalHeap<CAP> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.heap().alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.heap().dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        self.heap().realloc(ptr, layout, new_size)
    }
}
