use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Completion for [`SecureChannel::begin_write`]: number of bytes written.
pub type WriteCompletion = Box<dyn FnOnce(std::io::Result<usize>) + Send + 'static>;

/// Completion for [`SecureChannel::begin_read`]: the bytes read.
///
/// An empty buffer means the peer closed the stream.
pub type ReadCompletion = Box<dyn FnOnce(std::io::Result<Bytes>) + Send + 'static>;

/// A secured duplex byte stream with callback-based I/O.
///
/// `begin_*` calls return immediately; the completion runs later on an I/O
/// thread and receives the finalized result of the operation. A completion
/// may itself issue the next `begin_*` call.
pub trait SecureChannel: Send + Sync + 'static {
    /// Perform the blocking TLS handshake against `target_host`.
    fn authenticate(&self, target_host: &str) -> Result<()>;

    /// Write all of `data`, then invoke `on_complete`.
    fn begin_write(&self, data: Bytes, on_complete: WriteCompletion);

    /// Read at most `max_len` bytes, then invoke `on_complete`.
    fn begin_read(&self, max_len: usize, on_complete: ReadCompletion);

    /// Whether the underlying socket still reports a live connection.
    fn is_connected(&self) -> bool;

    /// Graceful close: notify the peer and shut down both directions,
    /// waiting at most `timeout`.
    fn shutdown(&self, timeout: Duration) -> Result<()>;

    /// Hard close. Safe to call more than once.
    fn close(&self);

    /// Remote address, if known.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}
