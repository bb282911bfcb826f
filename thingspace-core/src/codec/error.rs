//! Codec error types.

use thiserror::Error;

/// Fatal decoding failure.
///
/// Any of these means the input was not produced by a matching
/// [`ByteWriter`](super::ByteWriter) sequence, or was truncated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("varint exceeds maximum length ({max} bytes)", max = super::MAX_VARINT_BYTES)]
    VarintTooLong,

    #[error("varint overflow (value exceeds 64 bits)")]
    VarintOverflow,

    #[error("value {value} does not fit in a 32-bit int")]
    IntOutOfRange { value: i64 },

    #[error("invalid boolean byte {byte:#04x}")]
    InvalidBoolean { byte: u8 },

    #[error("invalid UTF-8 in {context}")]
    InvalidUtf8 { context: &'static str },

    #[error("negative length {len} for {context}")]
    NegativeLength { context: &'static str, len: i64 },

    #[error("unknown type tag {tag:?}")]
    UnknownType { tag: String },
}
