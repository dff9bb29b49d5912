//! Object pool configuration

use alloc::vec::Vec;

use hdf_api::error::{config_error, Result};

use crate::allocator::object_pool::{align_chunk_size, CHUNK_TAG_SIZE};

/// One size class of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Usable bytes per chunk, rounded up to [`crate::CHUNK_ALIGN`]
    pub chunk_size: u32,
    /// Number of chunks in the class
    pub chunk_count: u32,
}

impl ChunkConfig {
    /// Bytes this class occupies in the pool buffer, size tags included
    pub fn footprint(&self) -> usize {
        (CHUNK_TAG_SIZE + align_chunk_size(self.chunk_size as usize)) * self.chunk_count as usize
    }
}

/// Layout of an object pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPoolConfig {
    /// Size of the buffer reserved at initialization
    pub buffer_size: usize,
    /// Size classes, carved from the buffer in this order
    pub chunks: Vec<ChunkConfig>,
}

impl ObjectPoolConfig {
    /// Create a configuration with no size class
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            chunks: Vec::new(),
        }
    }

    /// Add a size class
    pub fn with_chunk(mut self, chunk_size: u32, chunk_count: u32) -> Self {
        self.chunks.push(ChunkConfig {
            chunk_size,
            chunk_count,
        });
        self
    }

    /// Buffer size needed to hold every configured class
    pub fn required_size(&self) -> usize {
        self.chunks.iter().map(ChunkConfig::footprint).sum()
    }

    /// Size the buffer to fit every configured class exactly
    pub fn fit_buffer(mut self) -> Self {
        self.buffer_size = self.required_size();
        self
    }

    /// Reject configurations that leave the pool useless
    pub fn validate(&self) -> Result<()> {
        if self.chunks.is_empty() {
            return Err(config_error("object pool has no size class"));
        }
        if self.chunks.iter().any(|c| c.chunk_size == 0 || c.chunk_count == 0) {
            return Err(config_error("object pool size class with zero size or count"));
        }
        if self.chunks.first().map_or(0, ChunkConfig::footprint) > self.buffer_size {
            return Err(config_error("object pool buffer cannot hold the first size class"));
        }
        Ok(())
    }
}
