//! Secure channel abstraction for kvlink.
//!
//! Provides the lowest layer of the connection stack:
//! - [`CompletionSignal`] bridging an I/O completion to one blocked caller
//! - [`SecureChannel`], a callback-driven TLS byte stream
//! - [`TlsChannel`], the rustls implementation running on a tokio runtime
//!
//! Everything else builds on top of the [`SecureChannel`] trait.

pub mod channel;
pub mod config;
pub mod error;
pub mod signal;
pub mod tls;

pub use channel::{ReadCompletion, SecureChannel, WriteCompletion};
pub use config::{TlsConfig, DEFAULT_CONNECT_TIMEOUT};
pub use error::{Result, TransportError};
pub use signal::{CompletionSignal, SignalError};
pub use tls::TlsChannel;

/// Re-exported so callers can hand in certificates without depending on rustls directly.
pub use rustls::pki_types::CertificateDer;
