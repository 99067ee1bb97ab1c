//! Placing a chosen free block: split off a remainder or keep it whole.
//!
//! When the leftover space after carving out the requested size is
//! itself big enough to stand alone as a block, it's split off and
//! re-indexed rather than handed out as slack attached to the
//! allocation; otherwise the whole block is handed out as-is. Either
//! way the right neighbor's `prev_is_mini` bit has to be kept in sync
//! with whichever block now sits immediately to its left.

use crate::mem::block::{
    block_prev_allocated, block_prev_mini, block_size, find_next, set_prev_flags, write_block,
};
use crate::mem::config::MIN_BLOCK_SIZE;
use crate::mem::free_index::FreeIndex;

/// Places `asize` bytes into `block`, splitting off and re-indexing a
/// remainder when one is big enough to stand alone.
///
/// # Safety
///
/// `block` must already be removed from `index`, be free, have
/// `block_size(block) >= asize`, and `asize` must be 16-aligned.
pub unsafe fn place(index: &mut FreeIndex, block: *mut u8, asize: usize) {
    let size = block_size(block);
    let prev_alloc = block_prev_allocated(block);
    let prev_mini = block_prev_mini(block);
    debug_assert!(size >= asize);

    if size - asize >= MIN_BLOCK_SIZE {
        write_block(block, asize, true, prev_alloc, prev_mini);

        let remainder = block.add(asize);
        let remainder_size = size - asize;
        let remainder_prev_mini = asize == MIN_BLOCK_SIZE;
        write_block(remainder, remainder_size, false, true, remainder_prev_mini);
        index.insert(remainder);

        if remainder_size == MIN_BLOCK_SIZE {
            let right = find_next(remainder);
            set_prev_flags(right, false, true);
        }
    } else {
        write_block(block, size, true, prev_alloc, prev_mini);
        let next = find_next(block);
        set_prev_flags(next, true, size == MIN_BLOCK_SIZE);
    }
}
