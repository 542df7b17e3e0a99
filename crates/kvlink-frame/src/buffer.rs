use bytes::{Bytes, BytesMut};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Growable byte buffer plus running byte count for one response cycle.
///
/// The length only grows between two calls to [`FrameBuffer::reset`].
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    received: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            received: 0,
        }
    }

    /// Append the bytes of one completed read.
    pub fn append(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        self.received += chunk.len();
        debug_assert_eq!(self.received, self.buf.len());
    }

    /// Running count of bytes received this cycle.
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn is_empty(&self) -> bool {
        self.received == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Hand the accumulated bytes out and start over with an empty buffer.
    pub fn take(&mut self) -> Bytes {
        self.received = 0;
        self.buf.split().freeze()
    }

    /// Discard everything and start a new cycle.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.received = 0;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
