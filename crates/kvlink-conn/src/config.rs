use std::time::Duration;

use kvlink_frame::{FrameConfig, DEFAULT_MAX_BODY, DEFAULT_READ_CHUNK};

/// Default time allowed for a graceful close.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-connection behaviour.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upper bound on the graceful close in [`crate::Connection::dispose`].
    pub shutdown_timeout: Duration,
    /// Read size while a response header is still incomplete.
    pub read_chunk_size: usize,
    /// Largest response body accepted.
    pub max_body_size: usize,
    /// Refuse send/receive until `authenticate` succeeded.
    pub require_authentication: bool,
}

impl ConnectionConfig {
    /// Frame assembly settings derived from this configuration.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_body_size: self.max_body_size,
            read_chunk_size: self.read_chunk_size,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            read_chunk_size: DEFAULT_READ_CHUNK,
            max_body_size: DEFAULT_MAX_BODY,
            require_authentication: true,
        }
    }
}
