//! The allocator's public operations: init, allocate, free, reallocate,
//! zero-allocate, and the consistency check, plus a [`GlobalAlloc`]
//! wrapper for embedding this kernel as a `#[global_allocator]`.
//!
//! [`Allocator`] itself is the single-threaded algorithm; [`LockedHeap`]
//! wraps it behind a mutex so it can be called from a shared, possibly
//! multi-threaded entry point without the algorithm itself needing to
//! know anything about locking.

use core::alloc::{GlobalAlloc, Layout};
use core::cmp::min;
use core::ptr;

use spin::Mutex;

use crate::mem::block::{block_prev_allocated, block_prev_mini, block_size, write_block};
use crate::mem::check;
use crate::mem::coalesce::coalesce;
use crate::mem::config::{round_up, ALIGNMENT, CHUNK_SIZE, HEADER_SIZE, MIN_BLOCK_SIZE};
use crate::mem::extend::extend_heap;
use crate::mem::free_index::FreeIndex;
use crate::mem::place::place;
use crate::mem::source::HeapSource;

/// The single-threaded allocator kernel, generic over where its bytes
/// come from.
///
/// Every method that touches heap memory is `unsafe`: callers must
/// serialize access themselves (see [`LockedHeap`]) and must only pass
/// pointers this allocator itself returned.
pub struct Allocator<S: HeapSource> {
    source: S,
    index: FreeIndex,
    initialized: bool,
}

impl<S: HeapSource> Allocator<S> {
    /// Wraps `source`. The heap is not extended and no sentinels are
    /// written until the first [`allocate`](Self::allocate) call (or
    /// an explicit [`init`](Self::init)).
    pub const fn new(source: S) -> Self {
        Self {
            source,
            index: FreeIndex::new(),
            initialized: false,
        }
    }

    /// Writes the prologue/epilogue sentinels and performs the first
    /// heap extension. Idempotent: a second call is a cheap no-op.
    ///
    /// # Safety
    ///
    /// Must be called before any other operation observes a consistent
    /// heap, and must not race a concurrent call (serialize externally).
    pub unsafe fn init(&mut self) -> bool {
        if self.initialized {
            return true;
        }

        let sentinels = match self.source.extend(2 * HEADER_SIZE) {
            Ok(addr) => addr,
            Err(_) => return false,
        };
        // Prologue: a zero-sized allocated sentinel. Nothing ever reads
        // its own flags, only the first real block's `prev_allocated`.
        write_block(sentinels, 0, true, true, false);
        let epilogue = sentinels.add(HEADER_SIZE);
        write_block(epilogue, 0, true, true, false);

        match extend_heap(&mut self.source, &mut self.index, CHUNK_SIZE) {
            Some(_) => {
                self.initialized = true;
                true
            }
            None => false,
        }
    }

    /// Allocates at least `size` bytes, returning a 16-aligned pointer
    /// or `None` on zero size or exhaustion.
    ///
    /// # Safety
    ///
    /// The heap must not be concurrently accessed during the call.
    pub unsafe fn allocate(&mut self, size: usize) -> Option<*mut u8> {
        if size == 0 {
            return None;
        }
        if !self.initialized && !self.init() {
            return None;
        }

        let asize = round_up(size + HEADER_SIZE, ALIGNMENT).max(MIN_BLOCK_SIZE);

        let block = match self.index.find_first_fit(asize) {
            Some(block) => block,
            None => {
                if extend_heap(&mut self.source, &mut self.index, asize.max(CHUNK_SIZE)).is_none() {
                    log::warn!("allocate({size}): heap source exhausted, returning none");
                    return None;
                }
                match self.index.find_first_fit(asize) {
                    Some(block) => block,
                    None => {
                        log::warn!("allocate({size}): no fit even after extension");
                        return None;
                    }
                }
            }
        };

        self.index.remove(block);
        place(&mut self.index, block, asize);
        Some(block.add(HEADER_SIZE))
    }

    /// Frees a pointer previously returned by [`allocate`](Self::allocate)
    /// or [`reallocate`](Self::reallocate). A null pointer is a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must be live (not already freed) and must have come from
    /// this same allocator instance.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let block = ptr.sub(HEADER_SIZE);
        let prev_alloc = block_prev_allocated(block);
        let prev_mini = block_prev_mini(block);
        let size = block_size(block);
        write_block(block, size, false, prev_alloc, prev_mini);
        coalesce(&mut self.index, block);
    }

    /// Resizes an allocation, preserving the shared prefix of old and
    /// new payload bytes bit-identically.
    ///
    /// # Safety
    ///
    /// Same requirements as [`allocate`](Self::allocate) and
    /// [`free`](Self::free): `ptr` must be null or a live pointer from
    /// this allocator.
    pub unsafe fn reallocate(&mut self, ptr: *mut u8, size: usize) -> Option<*mut u8> {
        if ptr.is_null() {
            return self.allocate(size);
        }
        if size == 0 {
            self.free(ptr);
            return None;
        }

        let old_block = ptr.sub(HEADER_SIZE);
        let old_payload_size = block_size(old_block) - HEADER_SIZE;

        let new_ptr = self.allocate(size)?;
        let copy_len = min(size, old_payload_size);
        ptr::copy_nonoverlapping(ptr, new_ptr, copy_len);
        self.free(ptr);
        Some(new_ptr)
    }

    /// Allocates space for `n` elements of `size` bytes each, zeroed.
    /// Returns `None` on `n * size` overflow or exhaustion.
    ///
    /// # Safety
    ///
    /// Same requirements as [`allocate`](Self::allocate).
    pub unsafe fn zero_allocate(&mut self, n: usize, size: usize) -> Option<*mut u8> {
        let total = n.checked_mul(size)?;
        let ptr = self.allocate(total)?;
        ptr::write_bytes(ptr, 0, total);
        Some(ptr)
    }

    /// Runs the consistency checker; see [`check::check`].
    ///
    /// # Safety
    ///
    /// The heap must not be concurrently mutated during the call.
    pub unsafe fn check(&self, line_hint: i32) -> bool {
        check::check(&self.source, &self.index, line_hint)
    }
}

/// A [`GlobalAlloc`] implementation wrapping [`Allocator`] in a
/// `spin::Mutex`, for installing this kernel as a process or kernel's
/// `#[global_allocator]`.
///
/// This is purely a serialization boundary: acquire the lock, call the
/// single-threaded kernel, release it. No block-format state is added
/// for locking.
pub struct LockedHeap<S: HeapSource> {
    inner: Mutex<Allocator<S>>,
}

impl<S: HeapSource> LockedHeap<S> {
    /// Wraps `source` in a lockable allocator. Does not touch memory
    /// until the first allocation.
    pub const fn new(source: S) -> Self {
        Self {
            inner: Mutex::new(Allocator::new(source)),
        }
    }

    /// Runs the consistency checker under the lock.
    pub fn check(&self, line_hint: i32) -> bool {
        unsafe { self.inner.lock().check(line_hint) }
    }
}

unsafe impl<S: HeapSource> GlobalAlloc for LockedHeap<S> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        debug_assert!(layout.align() <= ALIGNMENT, "alignment stricter than 16 bytes is unsupported");
        self.inner
            .lock()
            .allocate(layout.size())
            .unwrap_or(ptr::null_mut())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.inner.lock().free(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        self.inner
            .lock()
            .reallocate(ptr, new_size)
            .unwrap_or(ptr::null_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::source::HeapSourceError;
    use core::cell::UnsafeCell;

    /// A fixed-size static arena that also counts extension calls, so
    /// tests can assert coalescing avoided growing the heap further.
    #[repr(C, align(16))]
    struct MockSource<const CAP: usize> {
        bytes: UnsafeCell<[u8; CAP]>,
        top: usize,
        extends: usize,
    }

    impl<const CAP: usize> MockSource<CAP> {
        fn new() -> Self {
            Self {
                bytes: UnsafeCell::new([0; CAP]),
                top: 0,
                extends: 0,
            }
        }
    }

    unsafe impl<const CAP: usize> HeapSource for MockSource<CAP> {
        unsafe fn extend(&mut self, n: usize) -> Result<*mut u8, HeapSourceError> {
            self.extends += 1;
            if n > CAP - self.top {
                return Err(HeapSourceError::OutOfSpace);
            }
            let addr = self.bytes.get().cast::<u8>().add(self.top);
            self.top += n;
            Ok(addr)
        }

        fn lo(&self) -> *const u8 {
            self.bytes.get().cast()
        }

        fn hi(&self) -> *const u8 {
            if self.top == 0 {
                self.bytes.get().cast()
            } else {
                unsafe { self.bytes.get().cast::<u8>().add(self.top - 1) }
            }
        }
    }

    #[test]
    fn allocate_zero_returns_none() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            assert!(a.allocate(0).is_none());
        }
    }

    #[test]
    fn free_null_is_a_no_op() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            a.free(ptr::null_mut());
            assert!(a.check(0));
        }
    }

    #[test]
    fn mini_round_trip_reuses_the_freed_cell() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            let p = a.allocate(1).unwrap();
            assert!(!p.is_null());
            assert_eq!(p as usize % ALIGNMENT, 0);
            a.free(p);
            assert!(a.check(0));
            let q = a.allocate(1).unwrap();
            assert_eq!(p, q, "a freed mini block should be handed right back out");
        }
    }

    #[test]
    fn split_leaves_a_usable_remainder() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            let x = a.allocate(24).unwrap();
            let y = a.allocate(24).unwrap();
            assert_ne!(x, y);
            assert_eq!(x as usize % ALIGNMENT, 0);
            assert_eq!(y as usize % ALIGNMENT, 0);
            assert!(a.check(0));
        }
    }

    #[test]
    fn freeing_in_any_order_coalesces_back_to_one_block() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            let extends_after_init = a.source.extends;

            let x = a.allocate(100).unwrap();
            let y = a.allocate(100).unwrap();
            let z = a.allocate(100).unwrap();
            a.free(x);
            a.free(z);
            a.free(y);
            assert!(a.check(0));

            // The three frees should have coalesced back into one block
            // big enough to satisfy a near-chunk-sized request without
            // a further heap extension.
            assert!(a.allocate(CHUNK_SIZE - 512).is_some());
            assert_eq!(a.source.extends, extends_after_init);
        }
    }

    #[test]
    fn allocate_extends_the_heap_once_free_lists_are_exhausted() {
        let mut a = Allocator::new(MockSource::<1_048_576>::new());
        unsafe {
            assert!(a.init());
            let mut ptrs = [ptr::null_mut::<u8>(); 64];
            for p in ptrs.iter_mut() {
                *p = a.allocate(100).unwrap();
            }
            assert!(a.check(0));
            for &p in ptrs.iter() {
                a.free(p);
            }
            assert!(a.check(0));
        }
    }

    #[test]
    fn reallocate_preserves_the_shared_prefix() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            let p = a.allocate(8).unwrap();
            for i in 0..8 {
                p.add(i).write(0xAA);
            }
            let q = a.reallocate(p, 1000).unwrap();
            for i in 0..8 {
                assert_eq!(q.add(i).read(), 0xAA);
            }
            assert!(a.check(0));
        }
    }

    #[test]
    fn reallocate_null_behaves_like_allocate() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            let p = a.reallocate(ptr::null_mut(), 32).unwrap();
            assert!(!p.is_null());
        }
    }

    #[test]
    fn reallocate_zero_behaves_like_free() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            let p = a.allocate(32).unwrap();
            assert!(a.reallocate(p, 0).is_none());
            assert!(a.check(0));
        }
    }

    #[test]
    fn zero_allocate_zeroes_the_whole_region() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            let p = a.zero_allocate(4, 8).unwrap();
            for i in 0..32 {
                assert_eq!(p.add(i).read(), 0);
            }
        }
    }

    #[test]
    fn check_detects_a_corrupted_block_size() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            let p = a.allocate(32).unwrap();
            assert!(a.check(0));

            // Stomp the header's size field directly, as a buffer
            // overrun into the next block's metadata would: the block
            // now claims to run well past the heap's current top.
            let block = p.sub(HEADER_SIZE);
            let corrupt = block_size(block) + 8192;
            write_block(block, corrupt, true, true, false);

            assert!(!a.check(0));
        }
    }

    #[test]
    fn check_detects_a_corrupted_prologue() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            assert!(a.check(0));

            // Clear the prologue's alloc bit directly, as a stray
            // write before the heap's first block would: the
            // sentinel no longer reads as zero-sized and allocated.
            let prologue = a.source.lo() as *mut u8;
            write_block(prologue, 0, false, true, false);

            assert!(!a.check(0));
        }
    }

    #[test]
    fn zero_allocate_rejects_multiplication_overflow() {
        let mut a = Allocator::new(MockSource::<65536>::new());
        unsafe {
            assert!(a.init());
            let extends_before = a.source.extends;
            assert!(a.zero_allocate(usize::MAX, 2).is_none());
            assert_eq!(a.source.extends, extends_before, "overflow must not touch the heap");
        }
    }
}
