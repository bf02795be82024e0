//! Wire encodings: the compact binary form and the human-readable text form.
//!
//! ## Binary wire format
//!
//! Each field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: group start and end (deprecated, skipped on read)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! ## Text format
//!
//! `name: value` pairs, braces for nested messages, brackets for repeated
//! values and `[type.url]` markers for `Any` payloads. See [`TextReader`].

mod binary;
mod signature;
mod text;

use crate::error::{Error, Result};
use std::fmt;

pub use binary::BinaryReader;
pub use signature::{FieldShape, Signature, SignatureCache};
pub use text::{TextReader, Token};

/// Wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::malformed_tag(0, 0, value)),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Varint => "varint",
            WireType::I64 => "fixed64",
            WireType::Len => "bytes",
            WireType::StartGroup => "group",
            WireType::EndGroup => "end-group",
            WireType::I32 => "fixed32",
        };
        f.write_str(name)
    }
}

/// A decoded field key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    /// Field number, never zero
    pub field: u32,
    /// How the value is framed
    pub wire_type: WireType,
}

impl Tag {
    /// Creates a tag
    pub fn new(field: u32, wire_type: WireType) -> Self {
        Self { field, wire_type }
    }
}

/// Default cap on the number of elements in one repeated field
pub const DEFAULT_MAX_REPEATED_LEN: usize = 1 << 28;

/// Group nesting accepted by [`BinaryReader::skip_type`] when
/// [`ReaderConfig::max_depth`] is unset
pub const DEFAULT_MAX_GROUP_DEPTH: usize = 100;

/// What the text reader does with a field name the schema does not handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFieldPolicy {
    /// Fail with [`Error::UnsupportedField`]
    #[default]
    Reject,
    /// Skip the value and record the field name
    Collect,
}

/// Configuration shared by the binary and text readers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Deepest nesting signature inference descends into (`None` = unbounded).
    /// Payloads below the limit are reported as opaque bytes. Also bounds
    /// group nesting while skipping, which otherwise stops at
    /// [`DEFAULT_MAX_GROUP_DEPTH`].
    pub max_depth: Option<usize>,
    /// Maximum number of elements accepted in a single repeated field
    pub max_repeated_len: usize,
    /// Unknown text field handling
    pub unknown_fields: UnknownFieldPolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_repeated_len: DEFAULT_MAX_REPEATED_LEN,
            unknown_fields: UnknownFieldPolicy::Reject,
        }
    }
}

impl ReaderConfig {
    /// Creates a new reader config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits signature inference nesting
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the repeated field element cap
    pub fn max_repeated_len(mut self, len: usize) -> Self {
        self.max_repeated_len = len;
        self
    }

    /// Sets the unknown text field policy
    pub fn unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_type_conversion() {
        assert_eq!(WireType::try_from(0).unwrap(), WireType::Varint);
        assert_eq!(WireType::try_from(1).unwrap(), WireType::I64);
        assert_eq!(WireType::try_from(2).unwrap(), WireType::Len);
        assert_eq!(WireType::try_from(4).unwrap(), WireType::EndGroup);
        assert_eq!(WireType::try_from(5).unwrap(), WireType::I32);
        assert!(WireType::try_from(6).is_err());
        assert!(WireType::try_from(7).is_err());
    }

    #[test]
    fn test_reader_config_builder() {
        let config = ReaderConfig::new()
            .max_depth(8)
            .max_repeated_len(100)
            .unknown_fields(UnknownFieldPolicy::Collect);

        assert_eq!(config.max_depth, Some(8));
        assert_eq!(config.max_repeated_len, 100);
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Collect);
        assert_eq!(ReaderConfig::default().max_depth, None);
    }
}
