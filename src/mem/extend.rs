//! Growing the heap and re-establishing the epilogue sentinel.
//!
//! Rounds the request up, pulls more bytes from the backing source,
//! then reinterprets the slot the old epilogue occupied as the new
//! block's header — the old epilogue's flags carry forward exactly
//! the `prev_allocated`/`prev_is_mini` state the new block needs.
//! A fresh epilogue is written at the new top, and the new block is
//! handed straight to the coalescer so a free left neighbor absorbs
//! it; this also covers the very first extension without having to
//! special-case "there is no block yet".

use crate::mem::block::{block_prev_allocated, block_prev_mini, write_block};
use crate::mem::coalesce::coalesce;
use crate::mem::config::{round_up, ALIGNMENT, HEADER_SIZE, MIN_BLOCK_SIZE};
use crate::mem::free_index::FreeIndex;
use crate::mem::source::HeapSource;

/// Extends the heap by at least `request_bytes`, folds the new region
/// into the free-index, and returns the resulting free block.
///
/// Returns `None` if the backing [`HeapSource`] is exhausted.
///
/// # Safety
///
/// The byte immediately before the address `source.extend` returns
/// must currently hold a valid epilogue word (zero-sized, allocated),
/// as left by [`super::api::Allocator::init`] or a prior call to this
/// function.
pub unsafe fn extend_heap<S: HeapSource>(
    source: &mut S,
    index: &mut FreeIndex,
    request_bytes: usize,
) -> Option<*mut u8> {
    let size = round_up(request_bytes.max(MIN_BLOCK_SIZE), ALIGNMENT);
    let bp = source.extend(size).ok()?;

    let block = bp.sub(HEADER_SIZE);
    let prev_alloc = block_prev_allocated(block);
    let prev_mini = block_prev_mini(block);

    write_block(block, size, false, prev_alloc, prev_mini);

    let new_top = block.add(size);
    write_block(new_top, 0, true, false, size == MIN_BLOCK_SIZE);

    log::debug!("heap extended by {size} bytes");

    Some(coalesce(index, block))
}
