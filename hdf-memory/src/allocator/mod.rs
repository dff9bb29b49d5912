//! Memory allocator module
//!
//! This module contains the allocators of the driver framework.

pub mod object_pool;
