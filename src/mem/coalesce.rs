//! Boundary-tag coalescing.
//!
//! Merges a just-freed block with whichever of its immediate heap
//! neighbors are also free. The left neighbor (if any) is located
//! through its boundary tag; the right neighbor is always reachable
//! directly since every block carries its own size. The four
//! neighbor-allocation cases are kept explicit rather than folded
//! into one generic merge, so each one's free-index bookkeeping and
//! neighbor-flag updates stay easy to read back against the
//! invariants they restore.

use crate::mem::block::{
    block_allocated, block_prev_allocated, block_prev_mini, block_size, find_next, find_prev,
    set_prev_flags, write_block,
};
use crate::mem::config::MIN_BLOCK_SIZE;
use crate::mem::free_index::FreeIndex;

/// Coalesces `block` (already marked free, not yet indexed) with any
/// free immediate neighbors, inserts the resulting block into `index`,
/// and returns it.
///
/// # Safety
///
/// `block` must be a freshly freed block: its header already says
/// `alloc = false` with its own `prev_allocated`/`prev_is_mini` intact,
/// and it must not yet be a member of any free list. Its heap
/// neighbors must be valid, navigable blocks.
pub unsafe fn coalesce(index: &mut FreeIndex, block: *mut u8) -> *mut u8 {
    let p_alloc = block_prev_allocated(block);
    let next = find_next(block);
    let n_alloc = block_allocated(next);
    let size = block_size(block);

    match (p_alloc, n_alloc) {
        (true, true) => {
            index.insert(block);
            set_prev_flags(next, false, size == MIN_BLOCK_SIZE);
            block
        }
        (true, false) => {
            let next_size = block_size(next);
            index.remove(next);

            let new_size = size + next_size;
            let prev_mini = block_prev_mini(block);
            write_block(block, new_size, false, true, prev_mini);
            index.insert(block);

            let right = find_next(block);
            set_prev_flags(right, false, false);
            block
        }
        (false, true) => {
            let prev = find_prev(block);
            let prev_size = block_size(prev);
            index.remove(prev);

            let new_size = prev_size + size;
            let prev_prev_alloc = block_prev_allocated(prev);
            let prev_prev_mini = block_prev_mini(prev);
            write_block(prev, new_size, false, prev_prev_alloc, prev_prev_mini);
            index.insert(prev);

            set_prev_flags(next, false, false);
            prev
        }
        (false, false) => {
            let prev = find_prev(block);
            let next_size = block_size(next);
            index.remove(prev);
            index.remove(next);

            let prev_size = block_size(prev);
            let new_size = prev_size + size + next_size;
            let prev_prev_alloc = block_prev_allocated(prev);
            let prev_prev_mini = block_prev_mini(prev);
            write_block(prev, new_size, false, prev_prev_alloc, prev_prev_mini);
            index.insert(prev);

            let right = find_next(prev);
            set_prev_flags(right, false, false);
            prev
        }
    }
}
