//! Schema-less structure discovery.
//!
//! Given a binary message with no schema, [`Signature::infer`] walks every
//! field and tries to decode each length-delimited payload as a nested
//! message. A payload that decodes cleanly to its exact end becomes a
//! [`FieldShape::Message`]; anything else (strings, packed arrays, random
//! bytes) stays [`FieldShape::Bytes`].
//!
//! A signature is all-or-nothing per message. One malformed tag anywhere in
//! a nested payload turns that payload into opaque bytes, and one at the top
//! level empties the whole signature. Callers use the result to sniff file
//! formats, so a partial guess is worse than none.
//!
//! ## Example
//!
//! ```
//! use wirelens_core::wire::{FieldShape, Signature};
//!
//! // field 1: { field 1: 150, field 2: "no" }
//! let data = [0x0A, 0x07, 0x08, 0x96, 0x01, 0x12, 0x02, b'n', b'o'];
//! let signature = Signature::infer(&data);
//! assert_eq!(signature.shape_at(&[1, 1]), Some(&FieldShape::Varint));
//! assert_eq!(signature.shape_at(&[1, 2]), Some(&FieldShape::Bytes));
//! ```

use super::{BinaryReader, ReaderConfig, WireType};
use crate::error::Result;
use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// Inferred shape of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    /// Wire type 0
    Varint,
    /// Wire type 1
    Fixed64,
    /// Wire type 5
    Fixed32,
    /// Wire type 3, contents skipped
    Group,
    /// Length-delimited payload that is not a message
    Bytes,
    /// Length-delimited payload that decodes as a message
    Message(Signature),
}

impl FieldShape {
    fn scalar(wire_type: WireType) -> Self {
        match wire_type {
            WireType::Varint => FieldShape::Varint,
            WireType::I64 => FieldShape::Fixed64,
            WireType::I32 => FieldShape::Fixed32,
            WireType::StartGroup | WireType::EndGroup => FieldShape::Group,
            WireType::Len => FieldShape::Bytes,
        }
    }

    /// Wire type the shape was observed with
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldShape::Varint => WireType::Varint,
            FieldShape::Fixed64 => WireType::I64,
            FieldShape::Fixed32 => WireType::I32,
            FieldShape::Group => WireType::StartGroup,
            FieldShape::Bytes | FieldShape::Message(_) => WireType::Len,
        }
    }

    /// Nested signature, for message shapes
    pub fn as_message(&self) -> Option<&Signature> {
        match self {
            FieldShape::Message(signature) => Some(signature),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldShape::Varint => "varint",
            FieldShape::Fixed64 => "fixed64",
            FieldShape::Fixed32 => "fixed32",
            FieldShape::Group => "group",
            FieldShape::Bytes => "bytes",
            FieldShape::Message(_) => "message",
        }
    }

    /// Combines two observations of the same field.
    ///
    /// Opaque bytes absorb everything, two messages merge field by field,
    /// and any other disagreement degrades to bytes.
    fn merge(self, other: FieldShape) -> FieldShape {
        match (self, other) {
            (FieldShape::Bytes, _) | (_, FieldShape::Bytes) => FieldShape::Bytes,
            (FieldShape::Message(mut ours), FieldShape::Message(theirs)) => {
                ours.merge(theirs);
                FieldShape::Message(ours)
            }
            (ours, theirs) if ours == theirs => ours,
            _ => FieldShape::Bytes,
        }
    }
}

/// Field number to shape map recovered from binary content
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    fields: BTreeMap<u32, FieldShape>,
}

impl Signature {
    /// Empty signature
    pub fn new() -> Self {
        Self::default()
    }

    /// Infers the signature of `data` with no depth limit
    pub fn infer(data: &[u8]) -> Self {
        Self::infer_with(data, &ReaderConfig::default())
    }

    /// Infers the signature of `data`, honouring `config.max_depth`
    pub fn infer_with(data: &[u8], config: &ReaderConfig) -> Self {
        let mut reader = BinaryReader::new(data).with_config(config.clone());
        match top_level(&mut reader) {
            Ok(signature) => {
                debug!(fields = signature.len(), "inferred signature");
                signature
            }
            Err(err) => {
                debug!(%err, "no signature");
                Self::new()
            }
        }
    }

    /// Shape of a top-level field
    pub fn get(&self, field: u32) -> Option<&FieldShape> {
        self.fields.get(&field)
    }

    /// Follows a path of field numbers through nested messages
    pub fn shape_at(&self, path: &[u32]) -> Option<&FieldShape> {
        let (last, parents) = path.split_last()?;
        let mut signature = self;
        for field in parents {
            signature = signature.get(*field)?.as_message()?;
        }
        signature.get(*last)
    }

    /// Fields in ascending order
    pub fn iter(&self) -> btree_map::Iter<'_, u32, FieldShape> {
        self.fields.iter()
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when nothing was inferred
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn is_opaque(&self, field: u32) -> bool {
        matches!(self.fields.get(&field), Some(FieldShape::Bytes))
    }

    fn record(&mut self, field: u32, shape: FieldShape) {
        let merged = match self.fields.remove(&field) {
            Some(existing) => existing.merge(shape),
            None => shape,
        };
        self.fields.insert(field, merged);
    }

    /// Folds another observation of the same message into this one
    pub fn merge(&mut self, other: Signature) {
        for (field, shape) in other.fields {
            self.record(field, shape);
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for (field, shape) in &self.fields {
            writeln!(f, "{:indent$}{}: {}", "", field, shape.name(), indent = indent)?;
            if let FieldShape::Message(nested) = shape {
                nested.render(f, indent + 2)?;
            }
        }
        Ok(())
    }
}

impl<'s> IntoIterator for &'s Signature {
    type Item = (&'s u32, &'s FieldShape);
    type IntoIter = btree_map::Iter<'s, u32, FieldShape>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

impl BinaryReader<'_> {
    /// Infers the recursive signature of the whole input using this
    /// reader's configuration. The position is left untouched.
    pub fn infer_signature(&self) -> Signature {
        Signature::infer_with(self.data(), self.config())
    }
}

fn top_level(reader: &mut BinaryReader<'_>) -> Result<Signature> {
    match reader.data().first().map(|b| b & 7) {
        None | Some(4 | 6 | 7) => Ok(Signature::new()),
        _ => {
            let end = reader.length();
            body(reader, end, 0)
        }
    }
}

/// Reads a length prefix and classifies the payload behind it.
///
/// Fails only when the prefix itself is unreadable or overruns the
/// enclosing message; a payload that is not a message is `Ok(Bytes)`.
fn nested(reader: &mut BinaryReader<'_>, depth: usize) -> Result<FieldShape> {
    let length = reader.uint32()? as usize;
    let start = reader.position();
    let end = start.saturating_add(length);
    reader.seek(end)?;
    reader.seek(start)?;

    if reader.config().max_depth.is_some_and(|max| depth > max) {
        trace!(depth, "depth limit, payload kept opaque");
        reader.seek(end)?;
        return Ok(FieldShape::Bytes);
    }

    match reader.within(end, |r| body(r, end, depth)) {
        Ok(signature) => Ok(FieldShape::Message(signature)),
        Err(err) => {
            trace!(offset = start, %err, "payload is not a message");
            reader.seek(end)?;
            Ok(FieldShape::Bytes)
        }
    }
}

fn body(reader: &mut BinaryReader<'_>, end: usize, depth: usize) -> Result<Signature> {
    let mut signature = Signature::new();
    while reader.position() < end {
        let tag = reader.tag()?;
        if tag.wire_type == WireType::Len && !signature.is_opaque(tag.field) {
            let shape = nested(reader, depth + 1)?;
            signature.record(tag.field, shape);
            continue;
        }
        signature.record(tag.field, FieldShape::scalar(tag.wire_type));
        reader.skip_type(tag.wire_type)?;
    }
    Ok(signature)
}

/// Inferred signatures keyed by name, owned by the caller
#[derive(Debug, Clone, Default)]
pub struct SignatureCache {
    entries: HashMap<String, Signature>,
    config: ReaderConfig,
}

impl SignatureCache {
    /// Empty cache using the default reader configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache whose inferences use `config`
    pub fn with_config(config: ReaderConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    /// Cached signature for `name`, inferring it from `data` on first use
    pub fn get_or_infer(&mut self, name: &str, data: &[u8]) -> &Signature {
        let config = &self.config;
        self.entries.entry(name.to_string()).or_insert_with(|| {
            trace!(name, "signature cache miss");
            Signature::infer_with(data, config)
        })
    }

    /// Cached signature for `name`
    pub fn get(&self, name: &str) -> Option<&Signature> {
        self.entries.get(name)
    }

    /// Stores a signature, returning the one it replaces
    pub fn insert(&mut self, name: impl Into<String>, signature: Signature) -> Option<Signature> {
        self.entries.insert(name.into(), signature)
    }

    /// Number of cached signatures
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached signature
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(fields: Vec<(u32, FieldShape)>) -> FieldShape {
        FieldShape::Message(signature(fields))
    }

    fn signature(fields: Vec<(u32, FieldShape)>) -> Signature {
        Signature {
            fields: fields.into_iter().collect(),
        }
    }

    #[test]
    fn test_nested_message() {
        // 1: 150, 2: { 1: 1, 2: "no" }
        let data = [
            0x08, 0x96, 0x01, 0x12, 0x06, 0x08, 0x01, 0x12, 0x02, b'n', b'o',
        ];
        assert_eq!(
            Signature::infer(&data),
            signature(vec![
                (1, FieldShape::Varint),
                (2, message(vec![(1, FieldShape::Varint), (2, FieldShape::Bytes)])),
            ])
        );
    }

    #[test]
    fn test_string_payload_stays_bytes() {
        // 1: "name"
        let data = [0x0A, 0x04, b'n', b'a', b'm', b'e'];
        assert_eq!(
            Signature::infer(&data),
            signature(vec![(1, FieldShape::Bytes)])
        );
    }

    #[test]
    fn test_malformed_top_level_clears_everything() {
        // 1: 1, then field 2 with wire type 7
        assert!(Signature::infer(&[0x08, 0x01, 0x17]).is_empty());
        // truncated fixed64
        assert!(Signature::infer(&[0x08, 0x01, 0x11, 0x00]).is_empty());
        // nested length runs past the end
        assert!(Signature::infer(&[0x0A, 0x05, 0x08]).is_empty());
        // leading wire types 4, 6 and 7
        assert!(Signature::infer(&[0x0C]).is_empty());
        assert!(Signature::infer(&[0x0E, 0x00]).is_empty());
        assert!(Signature::infer(&[]).is_empty());
    }

    #[test]
    fn test_malformed_nested_degrades_to_bytes() {
        // 1: { 1: 1, 3: wire type 6 }
        let data = [0x0A, 0x03, 0x08, 0x01, 0x1E, 0x10, 0x02];
        assert_eq!(
            Signature::infer(&data),
            signature(vec![(1, FieldShape::Bytes), (2, FieldShape::Varint)])
        );
    }

    #[test]
    fn test_nested_must_end_exactly() {
        // 1: { 1: fixed32 } but only two payload bytes
        let data = [0x0A, 0x03, 0x0D, 0x01, 0x02];
        assert_eq!(
            Signature::infer(&data),
            signature(vec![(1, FieldShape::Bytes)])
        );
    }

    #[test]
    fn test_repeated_messages_merge() {
        // 1: { 1: 5 }, 1: { 2: 7 }
        let data = [0x0A, 0x02, 0x08, 0x05, 0x0A, 0x02, 0x10, 0x07];
        assert_eq!(
            Signature::infer(&data),
            signature(vec![(
                1,
                message(vec![(1, FieldShape::Varint), (2, FieldShape::Varint)])
            )])
        );
    }

    #[test]
    fn test_conflicts_degrade_to_bytes() {
        // 1: { 1: 5 }, 1: "ab" (wire type 6 when parsed)
        let data = [0x0A, 0x02, 0x08, 0x05, 0x0A, 0x02, 0x0E, 0x0E];
        assert_eq!(
            Signature::infer(&data),
            signature(vec![(1, FieldShape::Bytes)])
        );

        // once opaque, a later clean payload does not restore structure
        let data = [0x0A, 0x01, 0x0E, 0x0A, 0x02, 0x08, 0x05];
        assert_eq!(
            Signature::infer(&data),
            signature(vec![(1, FieldShape::Bytes)])
        );

        // 1: 5, 1: fixed32
        let data = [0x08, 0x05, 0x0D, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(
            Signature::infer(&data),
            signature(vec![(1, FieldShape::Bytes)])
        );
    }

    #[test]
    fn test_groups_are_skipped() {
        // 1: group { 2: 1 }, 3: 4
        let data = [0x0B, 0x10, 0x01, 0x0C, 0x18, 0x04];
        assert_eq!(
            Signature::infer(&data),
            signature(vec![(1, FieldShape::Group), (3, FieldShape::Varint)])
        );
    }

    #[test]
    fn test_deep_groups_give_no_signature() {
        let data = vec![0x0B; 2_000_000];
        assert!(Signature::infer(&data).is_empty());
        assert!(Signature::infer_with(&data, &ReaderConfig::new().max_depth(64)).is_empty());

        // 1: { 2: group { group { } } }
        let data = [0x0A, 0x04, 0x13, 0x13, 0x14, 0x14];
        let signature = Signature::infer_with(&data, &ReaderConfig::new().max_depth(1));
        assert_eq!(signature.shape_at(&[1]), Some(&FieldShape::Bytes));
    }

    #[test]
    fn test_depth_limit() {
        // 1: { 1: { 1: 1 } }
        let data = [0x0A, 0x04, 0x0A, 0x02, 0x08, 0x01];
        let unlimited = Signature::infer(&data);
        assert_eq!(unlimited.shape_at(&[1, 1, 1]), Some(&FieldShape::Varint));

        let limited = Signature::infer_with(&data, &ReaderConfig::new().max_depth(1));
        assert_eq!(limited.shape_at(&[1, 1]), Some(&FieldShape::Bytes));
        assert_eq!(limited.shape_at(&[1, 1, 1]), None);

        let flat = Signature::infer_with(&data, &ReaderConfig::new().max_depth(0));
        assert_eq!(flat, signature(vec![(1, FieldShape::Bytes)]));
    }

    #[test]
    fn test_display() {
        let data = [
            0x08, 0x96, 0x01, 0x12, 0x06, 0x08, 0x01, 0x12, 0x02, b'n', b'o',
        ];
        assert_eq!(
            Signature::infer(&data).to_string(),
            "1: varint\n2: message\n  1: varint\n  2: bytes\n"
        );
    }

    #[test]
    fn test_reader_entry_point_keeps_position() {
        let data = [0x08, 0x01];
        let mut reader = BinaryReader::new(&data);
        reader.skip(1).unwrap();
        assert_eq!(reader.infer_signature().len(), 1);
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_cache() {
        let mut cache = SignatureCache::new();
        let first = cache.get_or_infer("model", &[0x08, 0x01]).clone();
        // cached under the name, data is not consulted again
        let second = cache.get_or_infer("model", &[0x0D, 0, 0, 0, 0]).clone();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("model"), Some(&first));
        cache.clear();
        assert!(cache.is_empty());
    }
}
