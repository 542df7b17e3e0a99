//! Blocking request/response connections over a TLS channel.
//!
//! A [`Connection`] writes one request, then assembles one response frame
//! from as many read completions as it takes. Calls block the calling
//! thread on a completion signal while the I/O runs on a tokio runtime.

pub mod assembler;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;

pub use assembler::ResponseAssembler;
pub use config::{ConnectionConfig, DEFAULT_SHUTDOWN_TIMEOUT};
pub use connection::{Connection, ConnectionId};
pub use dispatcher::RequestDispatcher;
pub use error::{ConnectionError, Result};
pub use lifecycle::{Lifecycle, LifecycleState};
