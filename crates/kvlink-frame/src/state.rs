use tracing::trace;

use crate::buffer::FrameBuffer;
use crate::codec::{Frame, FrameConfig, Header, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Where a response cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPhase {
    AwaitingHeader,
    AwaitingBody,
    Complete,
}

/// Outcome of feeding one read into a [`ReadState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Issue another read.
    NeedMore,
    /// The frame is assembled; collect it with [`ReadState::take_frame`].
    Complete,
}

/// Per-response state of the incremental frame assembler.
///
/// Bytes from successive reads are appended until 24 header bytes are
/// available; the header is then parsed once and fixes the total frame
/// length. The state does no I/O itself, so the same machine drives both
/// blocking readers and completion callbacks.
#[derive(Debug, Default)]
pub struct ReadState {
    buffer: FrameBuffer,
    header: Option<Header>,
    frame: Option<Frame>,
    received: usize,
    reads: usize,
    complete: bool,
    config: FrameConfig,
}

impl ReadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Start a new response cycle.
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.header = None;
        self.frame = None;
        self.received = 0;
        self.reads = 0;
        self.complete = false;
    }

    /// Feed the bytes of one completed read.
    ///
    /// An empty chunk means the peer closed the stream and fails with
    /// [`FrameError::ConnectionClosed`].
    pub fn ingest(&mut self, chunk: &[u8]) -> Result<Progress> {
        if self.complete {
            return Err(FrameError::TrailingBytes(chunk.len()));
        }
        if chunk.is_empty() {
            return Err(FrameError::ConnectionClosed);
        }

        self.reads += 1;
        self.buffer.append(chunk);
        self.received += chunk.len();
        let received = self.received;
        trace!(reads = self.reads, len = chunk.len(), received, "read ingested");

        if self.header.is_none() && received >= HEADER_SIZE {
            let mut fixed = [0u8; HEADER_SIZE];
            fixed.copy_from_slice(&self.buffer.as_slice()[..HEADER_SIZE]);
            let header = Header::parse(&fixed);
            header.validate(self.config.max_body_size)?;
            trace!(
                opcode = header.opcode,
                body_length = header.body_length,
                "header parsed"
            );
            self.header = Some(header);
        }

        let Some(header) = self.header else {
            return Ok(Progress::NeedMore);
        };

        let total = header.total_length();
        match received.cmp(&total) {
            std::cmp::Ordering::Less => Ok(Progress::NeedMore),
            std::cmp::Ordering::Equal => {
                self.frame = Some(Frame::from_parts(header, self.buffer.take()));
                self.complete = true;
                Ok(Progress::Complete)
            }
            std::cmp::Ordering::Greater => Err(FrameError::TrailingBytes(received - total)),
        }
    }

    /// How many bytes the next read should ask for.
    ///
    /// Once the header is parsed this is exactly what is missing, so a read
    /// never runs past the end of the frame. Zero once complete.
    pub fn next_read_len(&self) -> usize {
        match self.expected_length() {
            Some(total) => total.saturating_sub(self.received()),
            None => self.config.read_chunk_size.max(1),
        }
    }

    /// Like [`ReadState::next_read_len`], but never reads past the header
    /// either. Used on streams that may carry back-to-back frames.
    pub fn exact_read_len(&self) -> usize {
        match self.expected_length() {
            Some(total) => total.saturating_sub(self.received()),
            None => HEADER_SIZE - self.received(),
        }
    }

    /// Stays `Complete` after the frame is taken, until the next `reset`.
    pub fn phase(&self) -> ReadPhase {
        if self.complete {
            ReadPhase::Complete
        } else if self.header.is_some() {
            ReadPhase::AwaitingBody
        } else {
            ReadPhase::AwaitingHeader
        }
    }

    /// Running count of bytes received this cycle.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Number of reads ingested this cycle.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// The parsed header, once 24 bytes have arrived.
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// `24 + body_length`, once the header is parsed.
    pub fn expected_length(&self) -> Option<usize> {
        self.header.map(|header| header.total_length())
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn take_frame(&mut self) -> Option<Frame> {
        self.frame.take()
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Update maximum body size for subsequent cycles.
    pub fn set_max_body_size(&mut self, max_body_size: usize) {
        self.config.max_body_size = max_body_size;
    }
}
