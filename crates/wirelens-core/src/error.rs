//! Error types for the wirelens-core library.
//!
//! Every reader in this crate reports failures through the single [`Error`]
//! enum. The variants fall into five families: bounds violations, malformed
//! wire data, text encoding problems, text syntax errors and arithmetic
//! errors raised by the wide integer types.

use thiserror::Error;

/// Result type alias for wirelens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all wirelens operations
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A read or seek would move past the end (or before the start) of the input
    #[error("unexpected end of input at offset {offset}: expected {needed} more bytes")]
    UnexpectedEof {
        /// Position the failing operation started from
        offset: usize,
        /// Number of bytes missing
        needed: usize,
    },

    /// A 64-bit unsigned value does not fit in 53 bits
    #[error("unsigned 64-bit value at offset {offset} exceeds the safe integer range")]
    UnsafeInteger {
        /// Byte offset of the value
        offset: usize,
    },

    /// Field number zero or a reserved wire type
    #[error("malformed tag at offset {offset}: field {field}, wire type {wire_type}")]
    MalformedTag {
        /// Byte offset of the tag
        offset: usize,
        /// Decoded field number
        field: u32,
        /// Decoded wire type
        wire_type: u8,
    },

    /// A varint ran past its maximum encoded width
    #[error("invalid varint encoding at offset {offset}")]
    InvalidVarint {
        /// Byte offset where the varint started
        offset: usize,
    },

    /// A packed repeated field has an impossible layout
    #[error("invalid packed array at offset {offset}: {details}")]
    InvalidPackedArray {
        /// Byte offset of the array payload
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// A repeated field grew past the configured element limit
    #[error("repeated field exceeds {limit} elements")]
    RepeatedTooLong {
        /// The configured limit
        limit: usize,
    },

    /// Groups nested deeper than the configured limit
    #[error("groups nested deeper than {limit} at offset {offset}")]
    NestingTooDeep {
        /// Byte offset of the group that crossed the limit
        offset: usize,
        /// The nesting limit in force
        limit: usize,
    },

    /// The input carries a byte-order mark for an encoding we do not decode
    #[error("unsupported {0} encoding")]
    UnsupportedEncoding(&'static str),

    /// The caller asked for an encoding that contradicts the detected one
    #[error("invalid encoding '{requested}': input is {detected}")]
    EncodingMismatch {
        /// The encoding label supplied by the caller
        requested: String,
        /// The encoding family found in the input
        detected: &'static str,
    },

    /// Malformed UTF-8 in strict mode
    #[error("invalid utf-8 character at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the offending sequence
        offset: usize,
    },

    /// The text tokenizer or parser rejected the input
    #[error("{message} at {location}")]
    TextSyntax {
        /// What went wrong
        message: String,
        /// `line:column` of the offending token
        location: String,
    },

    /// A text field name the schema does not know
    #[error("unsupported field '{tag}' at {location}")]
    UnsupportedField {
        /// The field name
        tag: String,
        /// `line:column` of the field
        location: String,
    },

    /// Wide integer division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Text that is not an integer in the requested radix, or out of range
    #[error("couldn't parse integer '{text}'")]
    InvalidInteger {
        /// The rejected text
        text: String,
    },

    /// Bit-packed element width outside 1..=32
    #[error("bit width {bits} is out of range")]
    InvalidBitWidth {
        /// The rejected width
        bits: u32,
    },

    /// Radix outside the range supported by the conversion
    #[error("radix {radix} is out of range")]
    RadixOutOfRange {
        /// The rejected radix
        radix: u32,
    },
}

impl Error {
    /// Creates a new end-of-input error
    pub fn unexpected_eof(offset: usize, needed: usize) -> Self {
        Self::UnexpectedEof { offset, needed }
    }

    /// Creates a new malformed tag error
    pub fn malformed_tag(offset: usize, field: u32, wire_type: u8) -> Self {
        Self::MalformedTag {
            offset,
            field,
            wire_type,
        }
    }

    /// Creates a new varint error
    pub fn invalid_varint(offset: usize) -> Self {
        Self::InvalidVarint { offset }
    }

    /// Creates a new packed array error
    pub fn invalid_packed_array(offset: usize, details: impl Into<String>) -> Self {
        Self::InvalidPackedArray {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new text syntax error
    pub fn text_syntax(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::TextSyntax {
            message: message.into(),
            location: location.into(),
        }
    }

    /// Returns true for wire-format problems that signature inference
    /// turns into "no signature" instead of failing
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof { .. }
                | Self::MalformedTag { .. }
                | Self::InvalidVarint { .. }
                | Self::InvalidPackedArray { .. }
                | Self::NestingTooDeep { .. }
        )
    }

    /// Returns true if this error reports reading outside the input
    pub fn is_bounds(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. } | Self::UnsafeInteger { .. })
    }
}
