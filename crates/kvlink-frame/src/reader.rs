use std::io::{ErrorKind, Read};

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::state::{Progress, ReadState};

/// Reads complete frames from any blocking `Read` stream.
///
/// Partial reads are handled internally; callers always get complete frames.
/// Reads never run past the end of the current frame, so back-to-back
/// frames on one stream are returned one at a time.
pub struct FrameReader<T> {
    inner: T,
    state: ReadState,
    chunk: Vec<u8>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let chunk = vec![0u8; config.read_chunk_size.max(1)];
        Self {
            inner,
            state: ReadState::with_config(config),
            chunk,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        self.state.reset();
        loop {
            let want = self.state.exact_read_len().min(self.chunk.len());
            let read = match self.inner.read(&mut self.chunk[..want]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if let Progress::Complete = self.state.ingest(&self.chunk[..read])? {
                if let Some(frame) = self.state.take_frame() {
                    return Ok(frame);
                }
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Update maximum body size for subsequent frames.
    pub fn set_max_body_size(&mut self, max_body_size: usize) {
        self.state.set_max_body_size(max_body_size);
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.state.config()
    }
}
