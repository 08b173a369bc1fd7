//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding binary frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid frame tag: {0:#04x}")]
    InvalidTag(u8),

    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("string length {0} exceeds remaining buffer")]
    OverlongString(usize),

    #[error("invalid utf-8 in string field")]
    InvalidUtf8,
}
