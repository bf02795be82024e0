//! The seam between the wire readers and schema code.
//!
//! A schema type implements [`Message`] by looping over fields and
//! dispatching on the field number (binary) or name (text). The readers call
//! back into it for nested messages through [`BinaryReader::message`] and
//! [`TextReader::message`].

use crate::error::Result;
use crate::wire::{BinaryReader, ReaderConfig, TextReader};
use tracing::debug;

/// A message that can be decoded from either wire encoding
pub trait Message: Default {
    /// Decodes fields until `end`, the offset where this message's payload
    /// stops. The reader is fenced to `end`, so reading past it fails.
    fn decode(reader: &mut BinaryReader<'_>, end: usize) -> Result<Self>;

    /// Decodes one message body, from [`TextReader::start`] until
    /// [`TextReader::end`] returns true
    fn decode_text(reader: &mut TextReader<'_>) -> Result<Self>;
}

/// Decodes a complete binary payload as `M`
pub fn decode_binary<M: Message>(data: &[u8]) -> Result<M> {
    decode_binary_with(data, ReaderConfig::default())
}

/// [`decode_binary`] with an explicit reader configuration
pub fn decode_binary_with<M: Message>(data: &[u8], config: ReaderConfig) -> Result<M> {
    let mut reader = BinaryReader::new(data).with_config(config);
    let end = reader.length();
    let message = M::decode(&mut reader, end)?;
    debug!(bytes = end, "decoded binary message");
    Ok(message)
}

/// Decodes a complete text document as `M`, detecting its encoding
pub fn decode_text<M: Message>(data: &[u8]) -> Result<M> {
    decode_text_with(data, None, ReaderConfig::default())
}

/// [`decode_text`] with an encoding hint and reader configuration
pub fn decode_text_with<M: Message>(
    data: &[u8],
    encoding: Option<&str>,
    config: ReaderConfig,
) -> Result<M> {
    let mut reader = TextReader::with_encoding(data, encoding)?.with_config(config);
    let message = M::decode_text(&mut reader)?;
    debug!(bytes = data.len(), "decoded text message");
    Ok(message)
}

/// Payload of an [`Any`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyValue {
    /// Binary encoding of the packed message
    Encoded(Vec<u8>),
    /// Verbatim text of a `[type.url] { ... }` payload
    Text(String),
}

impl Default for AnyValue {
    fn default() -> Self {
        AnyValue::Encoded(Vec::new())
    }
}

/// A message packed together with the URL of its type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Any {
    /// Type URL, such as `type.googleapis.com/onnx.TensorProto`
    pub type_url: String,
    /// Packed payload
    pub value: AnyValue,
}

impl Any {
    /// Type name after the last `/` of the URL
    pub fn type_name(&self) -> &str {
        self.type_url
            .rsplit_once('/')
            .map_or(self.type_url.as_str(), |(_, name)| name)
    }
}

impl Message for Any {
    fn decode(reader: &mut BinaryReader<'_>, end: usize) -> Result<Self> {
        let mut any = Any::default();
        while reader.position() < end {
            let tag = reader.tag()?;
            match tag.field {
                1 => any.type_url = reader.string()?,
                2 => any.value = AnyValue::Encoded(reader.bytes()?.to_vec()),
                _ => reader.skip_type(tag.wire_type)?,
            }
        }
        Ok(any)
    }

    fn decode_text(reader: &mut TextReader<'_>) -> Result<Self> {
        reader.any()
    }
}
