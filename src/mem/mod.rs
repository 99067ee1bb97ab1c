//! Allocator kernel modules.
//!
//! `block`, `free_index`, `coalesce`, `place`, `extend` and `check` are
//! the internal algorithm; `api` assembles them into the public
//! surface; `source` is the host abstraction the algorithm is built
//! against; `config` collects named constants.

pub mod api;
pub mod block;
pub mod check;
pub mod coalesce;
pub mod config;
pub mod extend;
pub mod free_index;
pub mod place;
pub mod source;

#[cfg(feature = "global")]
pub mod global;

pub use api::{Allocator, LockedHeap};
pub use source::{HeapSource, HeapSourceError, SbrkArena};

#[cfg(feature = "global")]
pub use global::GlobalHeap;
