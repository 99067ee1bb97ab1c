//! Consistency checker.
//!
//! Walks the heap left to right re-deriving every block-layout
//! invariant independently of the free-index, then walks the
//! free-index itself and cross-checks the two free-block counts
//! against each other. The bounds test below is careful to combine
//! the low and high comparisons with `||`: a block is out of bounds
//! if it is before `lo` *or* after `hi`, and writing that condition
//! with `&&` instead would silently accept every block, since no
//! address is both before `lo` and after `hi` at once.

use crate::mem::block::{block_allocated, block_size, find_next, read_header};
use crate::mem::config::{ALIGNMENT, HEADER_SIZE, MIN_BLOCK_SIZE, NUM_CLASSES};
use crate::mem::free_index::FreeIndex;
use crate::mem::source::HeapSource;

/// Runs every consistency check and returns whether they all pass.
/// `line_hint` is logged alongside any failure; it has no effect on
/// the result.
///
/// # Safety
///
/// The heap reachable from `source`'s bounds, and every list reachable
/// from `index`, must be dereferenceable (even if not currently
/// internally consistent — that's what this function is checking).
pub unsafe fn check<S: HeapSource>(source: &S, index: &FreeIndex, line_hint: i32) -> bool {
    let lo = source.lo();
    let hi = source.hi();
    if lo.is_null() {
        return true;
    }

    let prologue = read_header(lo);
    if block_size(lo) != 0 || !block_allocated(lo) {
        log::error!("check({line_hint}): prologue at {lo:p} is not a zero-sized allocated sentinel (word {prologue:#x})");
        return false;
    }

    let mut heap_free_count = 0usize;
    let mut prev_was_free = false;
    let mut block = lo.add(HEADER_SIZE) as *mut u8;

    loop {
        let size = block_size(block);
        let alloc = block_allocated(block);

        if size == 0 && alloc {
            break; // epilogue
        }

        if (block as *const u8) < lo || (block as *const u8) > hi {
            log::error!("check({line_hint}): block {block:p} outside heap bounds [{lo:p}, {hi:p}]");
            return false;
        }
        if size < MIN_BLOCK_SIZE || size % ALIGNMENT != 0 {
            log::error!("check({line_hint}): block {block:p} has bad size {size}");
            return false;
        }

        if !alloc {
            if prev_was_free {
                log::error!("check({line_hint}): two adjacent free blocks at {block:p}");
                return false;
            }
            if size > MIN_BLOCK_SIZE {
                let header = read_header(block);
                let footer = read_header(block.add(size - HEADER_SIZE));
                if header != footer {
                    log::error!("check({line_hint}): header/footer mismatch at {block:p}");
                    return false;
                }
            }
            heap_free_count += 1;
        }

        prev_was_free = !alloc;
        block = find_next(block);
    }

    let mut bounds_ok = true;
    let mut classes_ok = true;
    let mut list_free_count = 0usize;
    index.for_each(|class, b| {
        list_free_count += 1;
        let addr = b as *const u8;
        if addr < lo || addr > hi {
            bounds_ok = false;
        }
        if FreeIndex::class_of(block_size(b)) != class {
            classes_ok = false;
        }
    });

    if !bounds_ok {
        log::error!("check({line_hint}): free-list member outside heap bounds");
        return false;
    }
    if !classes_ok {
        log::error!("check({line_hint}): free block filed under wrong size class");
        return false;
    }

    for class in 1..NUM_CLASSES {
        if !index.links_consistent(class) {
            log::error!("check({line_hint}): class {class} links inconsistent");
            return false;
        }
    }

    if heap_free_count != list_free_count {
        log::error!(
            "check({line_hint}): heap walk saw {heap_free_count} free blocks, \
             free-index holds {list_free_count}"
        );
        return false;
    }

    true
}
