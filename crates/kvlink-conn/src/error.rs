use kvlink_frame::FrameError;
use kvlink_transport::TransportError;

/// Errors surfaced by connection operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Secure channel error, including handshake failures.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A write or read completed with an I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before the frame was complete.
    #[error("connection closed by peer (incomplete frame)")]
    ConnectionClosed,

    /// The response could not be parsed as a frame.
    #[error("protocol error: {0}")]
    Protocol(FrameError),

    /// Send or receive attempted before `authenticate`.
    #[error("connection is not authenticated")]
    NotAuthenticated,

    /// The connection was disposed, possibly while the call was blocked.
    #[error("connection disposed")]
    Disposed,

    /// `offset + length` falls outside the supplied buffer.
    #[error("range {offset}..{offset}+{length} outside buffer of {buffer_len} bytes")]
    InvalidRange {
        offset: usize,
        length: usize,
        buffer_len: usize,
    },
}

impl From<FrameError> for ConnectionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::ConnectionClosed => Self::ConnectionClosed,
            FrameError::Io(io) => Self::Io(io),
            other => Self::Protocol(other),
        }
    }
}

impl ConnectionError {
    /// Whether the error came from the TLS handshake.
    pub fn is_handshake(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Handshake { .. }))
    }

    /// Whether the connection can no longer be trusted for further requests.
    pub fn invalidates_connection(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Io(_) | Self::ConnectionClosed | Self::Protocol(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_map_onto_connection_taxonomy() {
        assert!(matches!(
            ConnectionError::from(FrameError::ConnectionClosed),
            ConnectionError::ConnectionClosed
        ));
        assert!(matches!(
            ConnectionError::from(FrameError::Io(std::io::Error::other("boom"))),
            ConnectionError::Io(_)
        ));
        assert!(matches!(
            ConnectionError::from(FrameError::InvalidMagic(0)),
            ConnectionError::Protocol(FrameError::InvalidMagic(0))
        ));
    }

    #[test]
    fn classification() {
        let handshake = ConnectionError::Transport(TransportError::Handshake {
            host: "localhost".into(),
            source: std::io::Error::other("bad certificate"),
        });
        assert!(handshake.is_handshake());
        assert!(handshake.invalidates_connection());

        assert!(!ConnectionError::Disposed.invalidates_connection());
        assert!(!ConnectionError::NotAuthenticated.is_handshake());
        assert!(ConnectionError::ConnectionClosed.invalidates_connection());
    }
}
