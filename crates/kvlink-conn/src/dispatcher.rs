use std::io;
use std::sync::Arc;

use bytes::Bytes;
use kvlink_transport::{CompletionSignal, SecureChannel};
use tracing::trace;

use crate::error::{ConnectionError, Result};
use crate::lifecycle::Lifecycle;

/// Sends one request buffer per call and blocks until the write completes.
pub struct RequestDispatcher<C> {
    channel: Arc<C>,
    lifecycle: Arc<Lifecycle>,
    signal: Arc<CompletionSignal<io::Result<usize>>>,
}

impl<C: SecureChannel> RequestDispatcher<C> {
    pub fn new(channel: Arc<C>, lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            channel,
            lifecycle,
            signal: Arc::new(CompletionSignal::new()),
        }
    }

    /// Write `buffer[offset..offset + length]` and wait for the completion.
    ///
    /// Returns the number of bytes the channel reported as written.
    pub fn send(&self, buffer: &[u8], offset: usize, length: usize) -> Result<usize> {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= buffer.len())
            .ok_or(ConnectionError::InvalidRange {
                offset,
                length,
                buffer_len: buffer.len(),
            })?;

        self.signal.reset();
        // A dispose racing ahead of the reset would have cancelled nothing.
        if !self.lifecycle.is_open() {
            self.signal.cancel();
            return Err(ConnectionError::Disposed);
        }

        let signal = Arc::clone(&self.signal);
        let lifecycle = Arc::clone(&self.lifecycle);
        self.channel.begin_write(
            Bytes::copy_from_slice(&buffer[offset..end]),
            Box::new(move |result| {
                if !lifecycle.is_open() {
                    signal.cancel();
                    return;
                }
                signal.release(result);
            }),
        );

        match self.signal.wait() {
            Ok(Ok(written)) => {
                trace!(written, "write completed");
                Ok(written)
            }
            Ok(Err(err)) => Err(ConnectionError::Io(err)),
            Err(_) => Err(ConnectionError::Disposed),
        }
    }

    /// Wake a caller blocked in [`RequestDispatcher::send`].
    pub fn cancel(&self) {
        self.signal.cancel();
    }
}

impl<C> std::fmt::Debug for RequestDispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("signal", &self.signal)
            .finish()
    }
}
