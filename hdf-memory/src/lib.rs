//! HDF Memory
//!
//! This crate provides the fixed-capacity object pool the driver framework
//! allocates from while the general-purpose heap is not available yet.
//! The pool is carved from a single buffer reserved at initialization into
//! size classes, and never grows afterwards.

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

// Memory management modules
pub mod allocator;
pub mod config;

// Re-export commonly used types
pub use allocator::object_pool::{Chunk, ObjectPool, PoolSlot, PoolStats, CHUNK_ALIGN, CHUNK_TAG_SIZE};
pub use config::{ChunkConfig, ObjectPoolConfig};
