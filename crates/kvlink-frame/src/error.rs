/// Errors that can occur while encoding or assembling frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header starts with an unknown magic byte.
    #[error("invalid frame magic 0x{0:02x} (expected 0x80 or 0x81)")]
    InvalidMagic(u8),

    /// The body exceeds the configured maximum size.
    #[error("body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// Key and extras do not fit inside the declared body.
    #[error("key ({key} bytes) and extras ({extras} bytes) exceed body length {body}")]
    InvalidLengths { key: usize, extras: usize, body: usize },

    /// A request field does not fit its header slot.
    #[error("{field} too long ({len} bytes, max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// More bytes arrived than the frame declared.
    #[error("{0} unexpected bytes past the end of the frame")]
    TrailingBytes(usize),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
