//! Fixed-size payload buffer pool.
//!
//! The pool bounds peak memory for the whole pipeline: every chunk payload
//! in flight - being filled by the caller, queued, transformed, or
//! delivered - lives in a buffer obtained here. Capacity is sized to cover
//! both hand-off queues plus headroom, so allocation only stalls when the
//! pipeline is genuinely saturated.
//!
//! Buffers are owned handles: storage returns to the free list when the
//! handle is dropped, and [`PoolBuffer::dispose`] consumes the handle, so
//! use-after-dispose and double-dispose cannot be expressed.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::PipelineError;

/// Fixed-capacity allocator recycling equally-sized byte buffers.
///
/// Cloning is cheap and shares the same free list; the pipeline hands a
/// clone to whoever needs allocation or accounting.
#[derive(Clone)]
pub struct BufferPool {
    buffer_size: usize,
    capacity: usize,
    free_tx: Sender<Vec<u8>>,
    free_rx: Receiver<Vec<u8>>,
}

impl BufferPool {
    /// Create a pool of `capacity` buffers of `buffer_size` bytes each.
    ///
    /// All storage is allocated up front; the pool never grows.
    ///
    /// # Panics
    ///
    /// Panics if `buffer_size` or `capacity` is 0.
    #[must_use]
    pub fn new(buffer_size: usize, capacity: usize) -> Self {
        assert!(buffer_size > 0, "buffer_size must be greater than 0");
        assert!(capacity > 0, "capacity must be greater than 0");

        let (free_tx, free_rx) = bounded(capacity);
        for _ in 0..capacity {
            free_tx
                .send(vec![0u8; buffer_size])
                .expect("free list cannot overflow its own capacity");
        }

        Self {
            buffer_size,
            capacity,
            free_tx,
            free_rx,
        }
    }

    /// Size of each buffer in bytes.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Total number of buffers owned by the pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffers currently available for allocation.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free_rx.len()
    }

    /// Take a buffer without blocking.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::PoolExhausted` if every buffer is in flight.
    pub fn try_alloc(&self) -> Result<PoolBuffer, PipelineError> {
        self.free_rx
            .try_recv()
            .map(|storage| self.wrap(storage))
            .map_err(|_| PipelineError::PoolExhausted)
    }

    /// Take a buffer, waiting up to `timeout` for one to be recycled.
    ///
    /// Returns `None` on timeout so callers can re-check termination flags
    /// and retry; the engine's `alloc` loops over this.
    #[must_use]
    pub fn alloc_timeout(&self, timeout: Duration) -> Option<PoolBuffer> {
        self.free_rx
            .recv_timeout(timeout)
            .ok()
            .map(|storage| self.wrap(storage))
    }

    fn wrap(&self, storage: Vec<u8>) -> PoolBuffer {
        PoolBuffer {
            storage,
            free_tx: self.free_tx.clone(),
        }
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.buffer_size)
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}

/// An exclusively-owned fixed-size byte buffer.
///
/// Dereferences to its full backing slice. Storage returns to the pool
/// when the handle is dropped, wherever that happens - including messages
/// discarded by cancellation - so pool capacity cannot leak.
pub struct PoolBuffer {
    storage: Vec<u8>,
    free_tx: Sender<Vec<u8>>,
}

impl PoolBuffer {
    /// Capacity of the buffer in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Return the buffer to the pool.
    ///
    /// Consumes the handle; this is also what dropping it does, but an
    /// explicit call reads better at release sites.
    pub fn dispose(self) {}
}

impl Deref for PoolBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.storage
    }
}

impl DerefMut for PoolBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }
}

impl Drop for PoolBuffer {
    fn drop(&mut self) {
        let storage = std::mem::take(&mut self.storage);
        if !storage.is_empty() {
            // If the pool itself is gone the storage is simply freed.
            let _ = self.free_tx.try_send(storage);
        }
    }
}

impl fmt::Debug for PoolBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuffer")
            .field("capacity", &self.capacity())
            .finish()
    }
}
