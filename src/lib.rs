//! A segregated, boundary-tag heap allocator kernel.
//!
//! This crate owns the hard part of a general-purpose allocator: block
//! layout with bit-packed metadata, boundary-tag coalescing with footer
//! elision, segregated free-list indexing with a dedicated mini-block
//! class, and the allocate / free / reallocate / zero-allocate entry
//! points built on top of them.
//!
//! It does not own a heap-extension primitive. Callers supply one by
//! implementing [`mem::source::HeapSource`]; [`mem::source::SbrkArena`]
//! is a ready-made, statically-sized implementation for embedding this
//! allocator directly in a `no_std` binary.
#![no_std]
#![allow(clippy::missing_safety_doc)]

pub mod mem;

pub use mem::{Allocator, HeapSource, LockedHeap, SbrkArena};

#[cfg(feature = "global")]
pub use mem::GlobalHeap;
