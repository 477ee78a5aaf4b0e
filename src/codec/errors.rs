//! Codec error types

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding binary values
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodecError {
    /// The buffer ended before the value was complete
    #[error("unexpected end of value stream at offset {0}")]
    UnexpectedEof(usize),

    /// A type tag byte did not name a known value kind
    #[error("unknown type tag 0x{tag:02x} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    /// A string value held invalid UTF-8
    #[error("invalid utf-8 in string value at offset {0}")]
    InvalidUtf8(usize),

    /// An encoded timestamp could not be represented
    #[error("timestamp out of representable range: {0} microseconds")]
    TimestampOutOfRange(i64),

    /// The input value has no representation in the wire format
    #[error("unsupported value shape: {0}")]
    UnsupportedShape(String),
}
