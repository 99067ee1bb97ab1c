//! Named constants for the allocator kernel.
//!
//! Collected here instead of being scattered through the algorithm
//! modules, the way `chunksize`/`NUMCLASS`/`min_block_size` were
//! scattered through the original single-file implementation this
//! crate is derived from.

/// Size of the header word, and of the footer word when one is present.
pub const HEADER_SIZE: usize = 8;

/// Minimum block size, and the alignment every block start and payload
/// pointer must satisfy.
pub const MIN_BLOCK_SIZE: usize = 16;

/// Alignment enforced on block sizes and payload addresses.
pub const ALIGNMENT: usize = 16;

/// Number of size classes in the free-index.
pub const NUM_CLASSES: usize = 10;

/// Bytes requested from the [`super::source::HeapSource`] the first time
/// the heap is extended, and the floor for every later extension.
pub const CHUNK_SIZE: usize = 4096;

/// Rounds `size` up to the next multiple of `align`. `align` must be a
/// power of two.
#[inline]
pub const fn round_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}
