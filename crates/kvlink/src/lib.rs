//! TLS transport for memcached binary-protocol clients.
//!
//! kvlink turns a TLS byte stream into blocking request/response calls:
//! one request is written, then exactly one response frame is assembled
//! from however many partial reads it arrives in.
//!
//! # Crate Structure
//!
//! - [`transport`]: Completion signal, secure channel trait, rustls channel
//! - [`frame`]: Header/frame model, request encoding, incremental read state
//! - [`conn`]: Connections: dispatcher, response assembler, lifecycle

/// Re-export transport types.
pub mod transport {
    pub use kvlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use kvlink_frame::*;
}

/// Re-export connection types.
pub mod conn {
    pub use kvlink_conn::*;
}

pub use kvlink_conn::{Connection, ConnectionConfig, ConnectionError};
pub use kvlink_frame::{Frame, ReadState, Request};
pub use kvlink_transport::TlsConfig;
