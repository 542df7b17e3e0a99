use std::fmt;
use std::io;

use kvlink_conn::ConnectionError;
use kvlink_frame::FrameError;
use kvlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// The server answered with a non-success status.
pub const NOT_FOUND: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const TLS_ERROR: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERRUPTED: i32 = 130;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::Handshake { .. } | TransportError::Tls(_) => {
            CliError::new(TLS_ERROR, format!("{context}: {err}"))
        }
        TransportError::InvalidServerName(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::FieldTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn connection_error(context: &str, err: ConnectionError) -> CliError {
    match err {
        ConnectionError::Transport(err) => transport_error(context, err),
        ConnectionError::Io(err) => io_error(context, err),
        ConnectionError::Protocol(err) => frame_error(context, err),
        ConnectionError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        ConnectionError::InvalidRange { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_failures_get_their_own_code() {
        let err = ConnectionError::Transport(TransportError::Handshake {
            host: "cache.internal".into(),
            source: io::Error::other("invalid peer certificate"),
        });
        let cli = connection_error("authenticate failed", err);
        assert_eq!(cli.code, TLS_ERROR);
        assert!(cli.message.starts_with("authenticate failed: "));
    }

    #[test]
    fn refused_connect_is_transport_error() {
        let err = TransportError::Connect {
            addr: "127.0.0.1:1".parse().unwrap(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(transport_error("connect failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn protocol_errors_are_data_invalid() {
        let err = ConnectionError::Protocol(FrameError::InvalidMagic(0x17));
        assert_eq!(connection_error("receive failed", err).code, DATA_INVALID);
        assert_eq!(
            connection_error("receive failed", ConnectionError::ConnectionClosed).code,
            TRANSPORT_ERROR
        );
    }
}
