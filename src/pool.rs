// SPDX-License-Identifier: GPL-3.0-or-later
//! A pool of reusable frame buffers (spec §3 `FrameBuffer`, §5 "Buffer
//! reuse").
//!
//! Buffers are checked out by the TUN reader, sliced to the length
//! actually read, handed to a decoder, and returned with their original
//! capacity restored. The pool only tracks capacity, not length, which is
//! what makes "restore capacity on return" correct: [BytesMut::clear]
//! resets the length to zero without touching the allocation.
use bytes::BytesMut;
use parking_lot::Mutex;

/// Buffers are allocated with at least this much capacity; TUN reads never
/// exceed it for a single packet.
pub const BUFFER_CAPACITY: usize = 2048;

pub struct BufferPool {
    free: Mutex<Vec<BytesMut>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Take a buffer from the pool, allocating a fresh one if it is empty.
    /// The returned buffer always has capacity >= [BUFFER_CAPACITY] and
    /// length 0.
    pub fn acquire(&self) -> BytesMut {
        let mut free = self.free.lock();
        free.pop()
            .unwrap_or_else(|| BytesMut::with_capacity(BUFFER_CAPACITY))
    }

    /// Return a buffer to the pool. Its length is cleared so the next
    /// `acquire` sees an empty buffer with the original capacity intact.
    pub fn release(&self, mut buf: BytesMut) {
        buf.clear();
        self.free.lock().push(buf);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_restores_capacity_for_next_acquire() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        let original_capacity = buf.capacity();
        buf.extend_from_slice(&[1, 2, 3]);
        pool.release(buf);

        let reused = pool.acquire();
        assert_eq!(reused.len(), 0);
        assert_eq!(reused.capacity(), original_capacity);
    }

    #[test]
    fn acquire_on_empty_pool_allocates_minimum_capacity() {
        let pool = BufferPool::new();
        let buf = pool.acquire();
        assert!(buf.capacity() >= BUFFER_CAPACITY);
    }
}
