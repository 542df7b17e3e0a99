use std::net::SocketAddr;

/// Errors that can occur on the secure channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the TCP connection.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The TLS handshake was rejected (certificate or negotiation failure).
    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        host: String,
        source: std::io::Error,
    },

    /// The target host cannot be used as a TLS server name.
    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    /// The TLS client configuration could not be built.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    /// An I/O error occurred on the underlying socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Read or write issued before the handshake or after close.
    ///
    /// Completions carry it as the inner error of an
    /// [`std::io::ErrorKind::NotConnected`] I/O error.
    #[error("secure channel is not open")]
    NotConnected,

    /// The handshake was already performed on this channel.
    #[error("secure channel is already authenticated")]
    AlreadyAuthenticated,

    /// The channel has been closed.
    #[error("secure channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
