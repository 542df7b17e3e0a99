//! Binary-protocol framing for kvlink.
//!
//! Every message is a 24-byte big-endian header followed by a body of
//! `extras | key | data`. The header's total body length fixes the frame
//! size, so a frame can be reassembled from any number of partial reads:
//! [`ReadState`] does exactly that without performing I/O itself.

pub mod buffer;
pub mod codec;
pub mod error;
pub mod opcode;
pub mod reader;
pub mod state;
pub mod writer;

pub use buffer::FrameBuffer;
pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, Header, Request, DEFAULT_MAX_BODY,
    DEFAULT_READ_CHUNK, HEADER_SIZE, MAGIC_REQUEST, MAGIC_RESPONSE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use state::{Progress, ReadPhase, ReadState};
pub use writer::FrameWriter;
