//! On-heap block layout: header/footer packing and neighbor navigation.
//!
//! Every block begins with an 8-byte header word. The header packs the
//! block's size into the high bits and three status flags into the
//! low bits of a single `u64`, using explicit mask constants rather
//! than a bitfield-derive struct, so the bit layout is pinned down
//! exactly rather than left to a macro's field order:
//!
//! ```text
//! bit 0       alloc
//! bit 1       prev_alloc
//! bit 2       prev_is_mini
//! bit 3       reserved, always 0
//! bits 4..63  size
//! ```
//!
//! A footer — an identical copy of the header — is written at the
//! block's last 8 bytes, but only when the block is free and larger
//! than the minimum size. Allocated blocks and mini free blocks carry
//! no footer; see [`write_block`] for the single point of truth on
//! that decision.

use crate::mem::config::{HEADER_SIZE, MIN_BLOCK_SIZE};

const ALLOC_BIT: u64 = 1 << 0;
const PREV_ALLOC_BIT: u64 = 1 << 1;
const PREV_MINI_BIT: u64 = 1 << 2;
const SIZE_MASK: u64 = !0xf_u64;

/// Packs a header (or footer) word from its constituent fields.
///
/// `size` must already be 16-aligned; low bits of `size` are masked
/// off rather than validated, mirroring the original `pack` which
/// trusts its caller.
#[inline]
pub const fn pack(size: usize, alloc: bool, prev_alloc: bool, prev_mini: bool) -> u64 {
    let mut word = size as u64 & SIZE_MASK;
    if alloc {
        word |= ALLOC_BIT;
    }
    if prev_alloc {
        word |= PREV_ALLOC_BIT;
    }
    if prev_mini {
        word |= PREV_MINI_BIT;
    }
    word
}

#[inline]
const fn unpack_size(word: u64) -> usize {
    (word & SIZE_MASK) as usize
}

#[inline]
const fn unpack_alloc(word: u64) -> bool {
    word & ALLOC_BIT != 0
}

#[inline]
const fn unpack_prev_alloc(word: u64) -> bool {
    word & PREV_ALLOC_BIT != 0
}

#[inline]
const fn unpack_prev_mini(word: u64) -> bool {
    word & PREV_MINI_BIT != 0
}

/// Reads the raw header word at `addr`.
///
/// # Safety
///
/// `addr` must be readable for 8 bytes and must actually be the start
/// of a block (header-aligned).
#[inline]
pub unsafe fn read_header(addr: *const u8) -> u64 {
    addr.cast::<u64>().read()
}

/// Writes a raw word at `addr`.
///
/// # Safety
///
/// `addr` must be writable for 8 bytes.
#[inline]
unsafe fn write_word(addr: *mut u8, word: u64) {
    addr.cast::<u64>().write(word);
}

/// Size encoded in the block's header.
///
/// # Safety
///
/// `block` must point at a valid block header.
#[inline]
pub unsafe fn block_size(block: *const u8) -> usize {
    unpack_size(read_header(block))
}

/// Whether the block is allocated.
///
/// # Safety
///
/// `block` must point at a valid block header.
#[inline]
pub unsafe fn block_allocated(block: *const u8) -> bool {
    unpack_alloc(read_header(block))
}

/// Whether the block's left neighbor is allocated (or the block is
/// the first real block, whose left neighbor is the prologue).
///
/// # Safety
///
/// `block` must point at a valid block header.
#[inline]
pub unsafe fn block_prev_allocated(block: *const u8) -> bool {
    unpack_prev_alloc(read_header(block))
}

/// Whether the block's left neighbor is a mini (16-byte) block.
///
/// # Safety
///
/// `block` must point at a valid block header.
#[inline]
pub unsafe fn block_prev_mini(block: *const u8) -> bool {
    unpack_prev_mini(read_header(block))
}

/// Writes a block's header at `addr`, and its footer too when the
/// block is free and larger than the minimum size.
///
/// This is the single place that decides whether a footer is emitted:
/// mini free blocks and every allocated block never get one.
///
/// # Safety
///
/// `addr` must be writable for `size` bytes.
#[inline]
pub unsafe fn write_block(
    addr: *mut u8,
    size: usize,
    alloc: bool,
    prev_alloc: bool,
    prev_mini: bool,
) {
    let word = pack(size, alloc, prev_alloc, prev_mini);
    write_word(addr, word);
    if !alloc && size > MIN_BLOCK_SIZE {
        write_word(addr.add(size - HEADER_SIZE), word);
    }
}

/// Overwrites only a block's header word, leaving any existing footer
/// untouched. Used when a coalescing or placing step only needs to
/// flip `prev_alloc`/`prev_is_mini` on a neighbor without touching its
/// size or its own footer (which, if present, encodes the same size
/// and alloc bit and is therefore still consistent).
///
/// # Safety
///
/// `addr` must point at a valid block header, writable for 8 bytes.
#[inline]
pub unsafe fn set_prev_flags(addr: *mut u8, prev_alloc: bool, prev_mini: bool) {
    let mut word = read_header(addr);
    word &= !(PREV_ALLOC_BIT | PREV_MINI_BIT);
    if prev_alloc {
        word |= PREV_ALLOC_BIT;
    }
    if prev_mini {
        word |= PREV_MINI_BIT;
    }
    write_word(addr, word);
}

/// Returns the block immediately to the right of `block`.
///
/// # Safety
///
/// `block` must not be the epilogue; the returned address must be
/// dereferenced only if it is known to be in-bounds.
#[inline]
pub unsafe fn find_next(block: *mut u8) -> *mut u8 {
    block.add(block_size(block))
}

/// Returns the block immediately to the left of `block`.
///
/// # Safety
///
/// Caller must have already established `!block_prev_allocated(block)`;
/// calling this when the left neighbor is allocated reads garbage,
/// since an allocated block carries no footer to recover its size from.
#[inline]
pub unsafe fn find_prev(block: *mut u8) -> *mut u8 {
    if block_prev_mini(block) {
        block.sub(MIN_BLOCK_SIZE)
    } else {
        let footer = read_header(block.sub(HEADER_SIZE));
        block.sub(unpack_size(footer))
    }
}
