//! Fixed-capacity object pool
//!
//! The pool serves allocations while the general-purpose heap is unavailable.
//! A single buffer is reserved at initialization and carved into size
//! classes; each class keeps a stack of free chunk indices. Every chunk is
//! preceded by a 4 byte size tag holding its class size, and [`ObjectPool::free`]
//! rediscovers the owning class from that tag.
//!
//! Allocation is best-fit upward: the smallest class whose chunk size is large
//! enough serves the request. When that class is exhausted the allocation
//! fails instead of spilling into a larger class, which keeps the pool
//! deterministic. Callers treat a failure exactly like heap exhaustion and
//! must not retry in a tight loop.

use alloc::boxed::Box;
use alloc::format;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};
use spin::Mutex;
use static_assertions::const_assert_eq;

use hdf_api::error::{busy, config_error, invalid_argument, Result};

use crate::config::ObjectPoolConfig;

/// Alignment of every chunk size
pub const CHUNK_ALIGN: usize = 4;

/// Bytes of the size tag stored in front of every chunk
pub const CHUNK_TAG_SIZE: usize = core::mem::size_of::<u32>();

const_assert_eq!(CHUNK_TAG_SIZE % CHUNK_ALIGN, 0);

/// Round a chunk size up to [`CHUNK_ALIGN`]
pub const fn align_chunk_size(size: usize) -> usize {
    (size + CHUNK_ALIGN - 1) & !(CHUNK_ALIGN - 1)
}

/// Handle to an allocated chunk.
///
/// The handle is neither `Clone` nor `Copy`: giving it back to
/// [`ObjectPool::free`] consumes it. It remembers the pool that issued it,
/// and every other pool rejects it.
#[derive(Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Identity of the issuing pool
    pool_id: u32,
    /// Offset of the user area inside the pool buffer
    offset: usize,
    /// Usable size of the chunk
    size: usize,
}

impl Chunk {
    /// Usable size of the chunk
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Usage of one size class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Usable bytes per chunk
    pub chunk_size: usize,
    /// Number of chunks in the class
    pub total_chunks: usize,
    /// Number of chunks currently free
    pub free_chunks: usize,
}

struct SizeClass {
    chunk_size: usize,
    /// Offset of the first chunk's size tag
    base: usize,
    chunk_count: usize,
    free: Vec<u32>,
    in_use: Vec<bool>,
}

impl SizeClass {
    fn stride(&self) -> usize {
        CHUNK_TAG_SIZE + self.chunk_size
    }

    fn user_offset(&self, index: usize) -> usize {
        self.base + index * self.stride() + CHUNK_TAG_SIZE
    }

    /// Index of the chunk whose user area starts at `offset`
    fn index_of(&self, offset: usize) -> Option<usize> {
        let start = offset.checked_sub(self.base + CHUNK_TAG_SIZE)?;
        if start % self.stride() != 0 {
            return None;
        }
        let index = start / self.stride();
        (index < self.chunk_count).then_some(index)
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            chunk_size: self.chunk_size,
            total_chunks: self.chunk_count,
            free_chunks: self.free.len(),
        }
    }
}

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

struct PoolState {
    buffer: Box<[u8]>,
    /// Sorted by ascending chunk size
    classes: Vec<SizeClass>,
}

impl PoolState {
    /// Classes eligible for `size`: all classes sharing the smallest fitting size
    fn suitable(&self, size: usize) -> Option<core::ops::Range<usize>> {
        let first = self.classes.iter().position(|c| c.chunk_size >= size)?;
        let best = self.classes[first].chunk_size;
        let end = self.classes[first..]
            .iter()
            .position(|c| c.chunk_size != best)
            .map_or(self.classes.len(), |n| first + n);
        Some(first..end)
    }

    fn read_tag(&self, offset: usize) -> Option<usize> {
        let tag_start = offset.checked_sub(CHUNK_TAG_SIZE)?;
        let bytes = self.buffer.get(tag_start..offset)?;
        let mut tag = [0u8; CHUNK_TAG_SIZE];
        tag.copy_from_slice(bytes);
        Some(u32::from_le_bytes(tag) as usize)
    }

    fn user_area(&mut self, chunk: &Chunk) -> Result<&mut [u8]> {
        self.buffer
            .get_mut(chunk.offset..chunk.offset + chunk.size)
            .ok_or_else(|| invalid_argument("chunk does not belong to this pool"))
    }
}

/// Size-classed, non-growable object pool
pub struct ObjectPool {
    id: u32,
    state: Mutex<PoolState>,
}

impl ObjectPool {
    /// Reserve the pool buffer and carve the configured size classes from it.
    ///
    /// Classes are carved in configuration order; a class that does not fit
    /// in the remaining buffer is skipped with a warning.
    pub fn new(config: &ObjectPoolConfig) -> Result<Self> {
        config.validate()?;

        let mut buffer = vec![0u8; config.buffer_size].into_boxed_slice();
        let mut classes = Vec::with_capacity(config.chunks.len());
        let mut cursor = 0usize;

        for chunk_config in config.chunks.iter() {
            let footprint = chunk_config.footprint();
            if cursor + footprint > buffer.len() {
                log::warn!(
                    "object pool: no room for {} chunks of {} bytes, class skipped",
                    chunk_config.chunk_count,
                    chunk_config.chunk_size
                );
                continue;
            }

            let chunk_size = align_chunk_size(chunk_config.chunk_size as usize);
            let chunk_count = chunk_config.chunk_count as usize;
            let class = SizeClass {
                chunk_size,
                base: cursor,
                chunk_count,
                // Popped from the back, so chunk 0 is handed out first
                free: (0..chunk_count as u32).rev().collect(),
                in_use: vec![false; chunk_count],
            };
            let tag = (chunk_size as u32).to_le_bytes();
            for index in 0..chunk_count {
                let user = class.user_offset(index);
                buffer[user - CHUNK_TAG_SIZE..user].copy_from_slice(&tag);
            }
            cursor += footprint;
            classes.push(class);
        }

        if classes.is_empty() {
            return Err(config_error("object pool buffer holds no size class"));
        }
        classes.sort_by_key(|class| class.chunk_size);

        Ok(Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(PoolState { buffer, classes }),
        })
    }

    /// Allocate a chunk of at least `size` bytes.
    ///
    /// Fails with [`hdf_api::Error::Busy`] when no class is large enough or when
    /// the best-fit class has no free chunk left.
    pub fn alloc(&self, size: usize) -> Result<Chunk> {
        let mut state = self.state.lock();
        let Some(range) = state.suitable(size) else {
            return Err(busy(&format!("no object pool class holds {} bytes", size)));
        };

        for class in state.classes[range].iter_mut() {
            if let Some(index) = class.free.pop() {
                let index = index as usize;
                class.in_use[index] = true;
                return Ok(Chunk {
                    pool_id: self.id,
                    offset: class.user_offset(index),
                    size: class.chunk_size,
                });
            }
        }
        Err(busy(&format!("object pool out of chunks for {} bytes", size)))
    }

    fn check_owner(&self, chunk: &Chunk) -> Result<()> {
        if chunk.pool_id != self.id {
            log::error!("object pool {}: chunk issued by pool {}", self.id, chunk.pool_id);
            return Err(invalid_argument("chunk does not belong to this pool"));
        }
        Ok(())
    }

    /// Return a chunk to its size class
    pub fn free(&self, chunk: Chunk) -> Result<()> {
        self.check_owner(&chunk)?;
        let mut state = self.state.lock();
        let Some(tag) = state.read_tag(chunk.offset) else {
            log::error!("object pool: chunk at {} is outside the pool", chunk.offset);
            return Err(invalid_argument("chunk does not belong to this pool"));
        };
        if tag != chunk.size {
            log::error!(
                "object pool: size tag {} does not match chunk size {}",
                tag,
                chunk.size
            );
            return Err(invalid_argument("corrupted chunk size tag"));
        }

        let Some(range) = state.suitable(tag) else {
            return Err(invalid_argument("no size class for chunk"));
        };
        for class in state.classes[range].iter_mut() {
            let Some(index) = class.index_of(chunk.offset) else {
                continue;
            };
            if !class.in_use[index] {
                log::warn!("object pool: double free of chunk at {}", chunk.offset);
                return Err(invalid_argument("chunk is already free"));
            }
            class.in_use[index] = false;
            class.free.push(index as u32);
            return Ok(());
        }
        Err(invalid_argument("chunk does not belong to this pool"))
    }

    /// Copy `data` into the chunk starting at byte `at`
    pub fn write(&self, chunk: &Chunk, at: usize, data: &[u8]) -> Result<()> {
        self.check_owner(chunk)?;
        let end = at
            .checked_add(data.len())
            .ok_or_else(|| invalid_argument("write past the end of the chunk"))?;
        let mut state = self.state.lock();
        let area = state.user_area(chunk)?;
        let dest = area
            .get_mut(at..end)
            .ok_or_else(|| invalid_argument("write past the end of the chunk"))?;
        dest.copy_from_slice(data);
        Ok(())
    }

    /// Copy bytes of the chunk starting at `at` into `out`
    pub fn read(&self, chunk: &Chunk, at: usize, out: &mut [u8]) -> Result<()> {
        self.check_owner(chunk)?;
        let end = at
            .checked_add(out.len())
            .ok_or_else(|| invalid_argument("read past the end of the chunk"))?;
        let mut state = self.state.lock();
        let area = state.user_area(chunk)?;
        let src = area
            .get(at..end)
            .ok_or_else(|| invalid_argument("read past the end of the chunk"))?;
        out.copy_from_slice(src);
        Ok(())
    }

    /// Allocate a chunk that returns itself to the pool when dropped
    pub fn obtain(self: &Arc<Self>, size: usize) -> Result<PoolSlot> {
        let chunk = self.alloc(size)?;
        Ok(PoolSlot {
            pool: self.clone(),
            chunk: Some(chunk),
        })
    }

    /// Usage of every size class, smallest first
    pub fn stats(&self) -> Vec<PoolStats> {
        self.state.lock().classes.iter().map(SizeClass::stats).collect()
    }

    /// Number of free chunks across all classes
    pub fn free_chunks(&self) -> usize {
        self.state.lock().classes.iter().map(|c| c.free.len()).sum()
    }
}

/// Chunk owned for the lifetime of a value
pub struct PoolSlot {
    pool: Arc<ObjectPool>,
    chunk: Option<Chunk>,
}

impl PoolSlot {
    /// Usable size of the slot
    pub fn size(&self) -> usize {
        self.chunk.as_ref().map_or(0, Chunk::size)
    }

    /// Copy `data` into the slot starting at byte `at`
    pub fn write(&self, at: usize, data: &[u8]) -> Result<()> {
        match self.chunk.as_ref() {
            Some(chunk) => self.pool.write(chunk, at, data),
            None => Err(invalid_argument("slot already released")),
        }
    }

    /// Copy bytes of the slot starting at `at` into `out`
    pub fn read(&self, at: usize, out: &mut [u8]) -> Result<()> {
        match self.chunk.as_ref() {
            Some(chunk) => self.pool.read(chunk, at, out),
            None => Err(invalid_argument("slot already released")),
        }
    }
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        if let Some(chunk) = self.chunk.take() {
            if let Err(err) = self.pool.free(chunk) {
                log::error!("object pool: failed to release slot: {}", err);
            }
        }
    }
}

impl core::fmt::Debug for PoolSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolSlot").field("chunk", &self.chunk).finish()
    }
}
