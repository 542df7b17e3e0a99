//! Opcodes and status codes used by the connection layer and CLI.
//!
//! Only the handful of operations kvlink itself issues are named here;
//! command definitions live in the client library above.

/// Retrieve a value.
pub const GET: u8 = 0x00;

/// Store a value.
pub const SET: u8 = 0x01;

/// Delete a key.
pub const DELETE: u8 = 0x04;

/// No-op; the server answers with an empty response.
pub const NOOP: u8 = 0x0a;

/// Ask for the server version string.
pub const VERSION: u8 = 0x0b;

/// Request succeeded.
pub const STATUS_SUCCESS: u16 = 0x0000;

/// Key not found.
pub const STATUS_KEY_NOT_FOUND: u16 = 0x0001;

/// Key already exists (CAS mismatch).
pub const STATUS_KEY_EXISTS: u16 = 0x0002;

/// Returns a human-readable name for an opcode.
pub fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        GET => "GET",
        SET => "SET",
        DELETE => "DELETE",
        NOOP => "NOOP",
        VERSION => "VERSION",
        _ => "UNKNOWN",
    }
}

/// Returns a human-readable name for a response status.
pub fn status_name(status: u16) -> &'static str {
    match status {
        STATUS_SUCCESS => "SUCCESS",
        STATUS_KEY_NOT_FOUND => "KEY_NOT_FOUND",
        STATUS_KEY_EXISTS => "KEY_EXISTS",
        0x0003 => "VALUE_TOO_LARGE",
        0x0004 => "INVALID_ARGUMENTS",
        0x0005 => "ITEM_NOT_STORED",
        0x0081 => "UNKNOWN_COMMAND",
        0x0082 => "OUT_OF_MEMORY",
        _ => "OTHER",
    }
}

