//! # Chunk Buffer
//!
//! Coalesces arbitrarily-sized inbound WebSocket frames into fixed-size
//! decodable chunks. Network deliveries have no relationship to decode-unit
//! boundaries, so bytes are accumulated until a full chunk can be sliced off;
//! any remainder stays buffered for the next frame.
//!
//! ## Key Properties:
//! - **Fixed output size**: every chunk from `push` is exactly `chunk_size` bytes
//! - **Order preserving**: chunks are emitted in byte-arrival order
//! - **Bounded remainder**: after `push` returns, the held remainder is always
//!   smaller than `chunk_size`
//! - **Explicit drain**: `flush` hands back the remainder (possibly short,
//!   never empty) at session end

/// Accumulates inbound frame bytes and slices them into fixed-size chunks.
///
/// One `ChunkBuffer` belongs to exactly one session; it is never shared
/// between connections.
#[derive(Debug)]
pub struct ChunkBuffer {
    /// Bytes received but not yet consumed into a full chunk.
    buffer: Vec<u8>,

    /// Fixed size of every emitted chunk, in bytes.
    chunk_size: usize,
}

impl ChunkBuffer {
    /// Create an empty buffer producing chunks of `chunk_size` bytes.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
        }
    }

    /// Append one inbound frame and drain every full chunk it completes.
    ///
    /// Returns zero or more chunks of exactly `chunk_size` bytes each, in the
    /// order the underlying bytes arrived. The remainder (always shorter than
    /// `chunk_size`) stays buffered for the next call.
    pub fn push(&mut self, frame: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(frame);

        let mut chunks = Vec::new();
        while self.buffer.len() >= self.chunk_size {
            let rest = self.buffer.split_off(self.chunk_size);
            chunks.push(std::mem::replace(&mut self.buffer, rest));
        }

        chunks
    }

    /// Drain the remaining buffered bytes at session end.
    ///
    /// Returns `None` when nothing is buffered; otherwise the final chunk,
    /// which may be shorter than `chunk_size` but is never empty.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Number of bytes currently held back as a partial chunk.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Configured chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
