//! Error types for the RCon transport and session layers.

use std::time::Duration;
use thiserror::Error;

/// Result type for packet encoding and decoding.
pub type WireResult<T> = Result<T, WireError>;

/// Result type for session operations.
pub type RconResult<T> = Result<T, RconError>;

/// Errors raised while decoding a BattlEye datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The datagram does not start with `BE`.
    #[error("invalid magic: expected \"BE\", got {0:02x?}")]
    InvalidMagic([u8; 2]),

    /// The byte following the checksum is not `0xFF`.
    #[error("invalid header terminator 0x{0:02x}")]
    InvalidTerminator(u8),

    /// CRC32 of the datagram body does not match the header.
    #[error("checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The datagram is shorter than its type requires.
    #[error("truncated packet: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Packet type byte is not one of login, command or message.
    #[error("unknown packet type 0x{0:02x}")]
    UnknownType(u8),
}

/// Errors surfaced to callers of [`crate::Session`].
#[derive(Debug, Error)]
pub enum RconError {
    /// Transport-level failure: refused, reset or unreachable endpoint.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// No response arrived within the deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The server rejected the shared secret, or demanded it again and
    /// rejected the renewed login.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A datagram from the server could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] WireError),

    /// The session listener has stopped.
    #[error("session closed")]
    Closed,
}

impl RconError {
    /// Whether this is a transport-level failure. Best-effort sweeps
    /// (countdown ticks, kick sweeps) warn about these and report anything
    /// else, such as a closed session, as an error; neither stops the sweep.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RconError::Connection(_) | RconError::Timeout(_) | RconError::Protocol(_)
        )
    }
}
