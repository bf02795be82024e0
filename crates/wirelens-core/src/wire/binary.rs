//! Binary wire format reader.
//!
//! [`BinaryReader`] borrows the input and walks it with a single position.
//! Message boundaries are not stored on the reader; schema code receives
//! the `end` offset of the message it decodes and loops until it reaches
//! it. Nested reads are additionally fenced: while a nested message, map
//! entry or packed array is being decoded, no primitive may read past its
//! end.

use super::{ReaderConfig, Tag, WireType, DEFAULT_MAX_GROUP_DEPTH};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::wide::{Int64, Uint64};
use std::collections::BTreeMap;
use tracing::trace;

/// Decoder for the binary wire format
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
    /// Reads may not cross this offset
    limit: usize,
    config: ReaderConfig,
}

impl<'a> BinaryReader<'a> {
    /// Creates a reader at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            limit: data.len(),
            config: ReaderConfig::default(),
        }
    }

    /// Creates a reader, or `None` for empty input
    pub fn open(data: &'a [u8]) -> Option<Self> {
        (!data.is_empty()).then(|| Self::new(data))
    }

    /// Replaces the reader configuration
    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Length of the whole input
    pub fn length(&self) -> usize {
        self.data.len()
    }

    /// Current offset
    pub fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Moves to an absolute offset within the current message
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.limit {
            return Err(Error::unexpected_eof(self.position, position - self.limit));
        }
        self.position = position;
        Ok(())
    }

    /// Moves forward by `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.position.saturating_add(count);
        if end > self.limit {
            return Err(Error::unexpected_eof(self.position, end - self.limit));
        }
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn array_of<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    fn byte(&mut self) -> Result<u8> {
        self.take(1).map(|b| b[0])
    }

    /// Runs `f` with reads fenced at `end`, restoring the outer fence after
    pub(crate) fn within<T>(&mut self, end: usize, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if end > self.limit {
            return Err(Error::unexpected_eof(self.position, end - self.limit));
        }
        let outer = std::mem::replace(&mut self.limit, end);
        let result = f(self);
        self.limit = outer;
        result
    }

    /// Reads a length prefix and returns the end offset it announces
    fn delimited_end(&mut self) -> Result<usize> {
        let start = self.position;
        let length = self.uint32()? as usize;
        let end = self.position.saturating_add(length);
        if end > self.limit {
            return Err(Error::unexpected_eof(start, end - self.limit));
        }
        Ok(end)
    }

    /// Varint truncated to 32 bits.
    ///
    /// Negative `int32` values are written as ten-byte varints; the five
    /// trailing bytes must then be exactly `FF FF FF FF 01`.
    pub fn uint32(&mut self) -> Result<u32> {
        let start = self.position;
        let mut value = 0u32;
        for i in 0..4 {
            let byte = self.byte()?;
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte < 0x80 {
                return Ok(value);
            }
        }
        let byte = self.byte()?;
        value |= ((byte & 0x0F) as u32) << 28;
        if byte < 0x80 {
            return Ok(value);
        }
        for expected in [0xFF, 0xFF, 0xFF, 0xFF, 0x01] {
            if self.byte()? != expected {
                return Err(Error::invalid_varint(start));
            }
        }
        Ok(value)
    }

    /// Varint as a two's complement `i32`
    pub fn int32(&mut self) -> Result<i32> {
        self.uint32().map(|v| v as i32)
    }

    /// Zig-zag encoded `i32`
    pub fn sint32(&mut self) -> Result<i32> {
        self.uint32().map(|v| ((v >> 1) as i32) ^ -((v & 1) as i32))
    }

    /// Up to ten varint groups split into low and high halves
    fn varint64(&mut self) -> Result<(u32, u32)> {
        let start = self.position;
        let mut low = 0u32;
        let mut high = 0u32;
        for i in 0..10u32 {
            let byte = self.byte()? as u32;
            let payload = byte & 0x7F;
            match i {
                0..=3 => low |= payload << (7 * i),
                4 => {
                    low |= payload << 28;
                    high |= payload >> 4;
                }
                _ => high |= payload << (7 * i - 32),
            }
            if byte < 0x80 {
                return Ok((low, high));
            }
        }
        Err(Error::invalid_varint(start))
    }

    /// Varint as a signed 64-bit value
    pub fn int64(&mut self) -> Result<Int64> {
        let (low, high) = self.varint64()?;
        Ok(Int64::new(low, high))
    }

    /// Varint as an unsigned 64-bit value
    pub fn uint64(&mut self) -> Result<Uint64> {
        let (low, high) = self.varint64()?;
        Ok(Uint64::new(low, high))
    }

    /// Zig-zag encoded signed 64-bit value
    pub fn sint64(&mut self) -> Result<Int64> {
        let (low, high) = self.varint64()?;
        // the sign travels in bit 0 of the low half
        let mask = (low & 1).wrapping_neg();
        Ok(Int64::new(
            ((low >> 1) | (high << 31)) ^ mask,
            (high >> 1) ^ mask,
        ))
    }

    /// Little-endian `u32`
    pub fn fixed32(&mut self) -> Result<u32> {
        self.array_of::<4>().map(u32::from_le_bytes)
    }

    /// Little-endian `i32`
    pub fn sfixed32(&mut self) -> Result<i32> {
        self.array_of::<4>().map(i32::from_le_bytes)
    }

    fn halves(&mut self) -> Result<(u32, u32)> {
        let low = self.fixed32()?;
        let high = self.fixed32()?;
        Ok((low, high))
    }

    /// Little-endian unsigned 64-bit value
    pub fn fixed64(&mut self) -> Result<Uint64> {
        let (low, high) = self.halves()?;
        Ok(Uint64::new(low, high))
    }

    /// Little-endian signed 64-bit value
    pub fn sfixed64(&mut self) -> Result<Int64> {
        let (low, high) = self.halves()?;
        Ok(Int64::new(low, high))
    }

    /// Little-endian `f32`
    pub fn float(&mut self) -> Result<f32> {
        self.array_of::<4>().map(f32::from_le_bytes)
    }

    /// Little-endian `f64`
    pub fn double(&mut self) -> Result<f64> {
        self.array_of::<8>().map(f64::from_le_bytes)
    }

    /// Any non-zero varint is true
    pub fn bool(&mut self) -> Result<bool> {
        let (low, high) = self.varint64()?;
        Ok(low != 0 || high != 0)
    }

    /// Length-delimited payload
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        let end = self.delimited_end()?;
        self.take(end - self.position)
    }

    /// Length-delimited UTF-8; invalid sequences are replaced
    pub fn string(&mut self) -> Result<String> {
        self.bytes()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Field key. Field zero and wire types 6 and 7 are malformed.
    pub fn tag(&mut self) -> Result<Tag> {
        let start = self.position;
        let raw = self.uint32()?;
        let field = raw >> 3;
        let wire_type = (raw & 7) as u8;
        if field == 0 {
            return Err(Error::malformed_tag(start, field, wire_type));
        }
        let wire_type =
            WireType::try_from(wire_type).map_err(|_| Error::malformed_tag(start, field, wire_type))?;
        Ok(Tag::new(field, wire_type))
    }

    fn check_repeated_len(&self, len: usize) -> Result<()> {
        if len >= self.config.max_repeated_len {
            return Err(Error::RepeatedTooLong {
                limit: self.config.max_repeated_len,
            });
        }
        Ok(())
    }

    /// Appends a repeated scalar, either packed (wire type 2) or a single
    /// unpacked element.
    pub fn array<T>(
        &mut self,
        values: &mut Vec<T>,
        tag: Tag,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<()> {
        if tag.wire_type != WireType::Len {
            self.check_repeated_len(values.len())?;
            values.push(item(self)?);
            return Ok(());
        }
        let end = self.delimited_end()?;
        self.within(end, |reader| {
            while reader.position < end {
                reader.check_repeated_len(values.len())?;
                values.push(item(reader)?);
            }
            Ok(())
        })
    }

    fn packed<T, const N: usize>(
        &mut self,
        values: &mut Vec<T>,
        tag: Tag,
        convert: fn([u8; N]) -> T,
    ) -> Result<()> {
        if tag.wire_type != WireType::Len {
            self.check_repeated_len(values.len())?;
            values.push(convert(self.array_of::<N>()?));
            return Ok(());
        }
        let start = self.position;
        if !values.is_empty() {
            return Err(Error::invalid_packed_array(
                start,
                "packed elements follow unpacked ones",
            ));
        }
        let end = self.delimited_end()?;
        let size = end - self.position;
        if size % N != 0 {
            return Err(Error::invalid_packed_array(
                start,
                format!("{} bytes is not a multiple of {}", size, N),
            ));
        }
        if size / N > self.config.max_repeated_len {
            return Err(Error::RepeatedTooLong {
                limit: self.config.max_repeated_len,
            });
        }
        let payload = self.take(size)?;
        values.reserve(size / N);
        values.extend(payload.chunks_exact(N).map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            convert(bytes)
        }));
        trace!(count = size / N, "decoded packed array");
        Ok(())
    }

    /// Repeated `float`, packed or unpacked.
    ///
    /// A packed payload must arrive into an empty vector and be a whole
    /// number of elements.
    pub fn floats(&mut self, values: &mut Vec<f32>, tag: Tag) -> Result<()> {
        self.packed::<f32, 4>(values, tag, f32::from_le_bytes)
    }

    /// Repeated `double`, packed or unpacked
    pub fn doubles(&mut self, values: &mut Vec<f64>, tag: Tag) -> Result<()> {
        self.packed::<f64, 8>(values, tag, f64::from_le_bytes)
    }

    /// Consumes one varint without decoding it
    pub fn skip_varint(&mut self) -> Result<()> {
        let start = self.position;
        for _ in 0..10 {
            if self.byte()? < 0x80 {
                return Ok(());
            }
        }
        Err(Error::invalid_varint(start))
    }

    /// Consumes one field value of the given wire type, including entire
    /// groups. Group nesting is bounded by [`ReaderConfig::max_depth`].
    pub fn skip_type(&mut self, wire_type: WireType) -> Result<()> {
        match wire_type {
            WireType::Varint => self.skip_varint(),
            WireType::I64 => self.skip(8),
            WireType::Len => {
                let end = self.delimited_end()?;
                self.seek(end)
            }
            WireType::StartGroup => {
                let limit = self.config.max_depth.unwrap_or(DEFAULT_MAX_GROUP_DEPTH);
                let mut depth = 1usize;
                while depth > 0 {
                    let start = self.position;
                    match self.tag()?.wire_type {
                        WireType::StartGroup => {
                            depth += 1;
                            if depth > limit {
                                return Err(Error::NestingTooDeep { offset: start, limit });
                            }
                        }
                        WireType::EndGroup => depth -= 1,
                        other => self.skip_type(other)?,
                    }
                }
                Ok(())
            }
            WireType::EndGroup => Err(Error::malformed_tag(self.position, 0, wire_type as u8)),
            WireType::I32 => self.skip(4),
        }
    }

    /// Reads a map entry: a nested message with the key in field 1 and the
    /// value in field 2. Missing halves take their default value.
    pub fn entry<K: Default, V: Default>(
        &mut self,
        mut key: impl FnMut(&mut Self) -> Result<K>,
        mut value: impl FnMut(&mut Self) -> Result<V>,
    ) -> Result<(K, V)> {
        let end = self.delimited_end()?;
        self.within(end, |reader| {
            let mut k = K::default();
            let mut v = V::default();
            while reader.position < end {
                let tag = reader.tag()?;
                match tag.field {
                    1 => k = key(reader)?,
                    2 => v = value(reader)?,
                    _ => reader.skip_type(tag.wire_type)?,
                }
            }
            Ok((k, v))
        })
    }

    /// Decodes a length-delimited nested message
    pub fn message<M: Message>(&mut self) -> Result<M> {
        let end = self.delimited_end()?;
        let message = self.within(end, |reader| M::decode(reader, end))?;
        self.position = end;
        Ok(message)
    }

    /// Wire types of the top-level fields.
    ///
    /// Any malformed tag or truncated value yields an empty map. The
    /// position is left untouched.
    pub fn field_types(&self) -> BTreeMap<u32, WireType> {
        let mut probe = BinaryReader::new(self.data);
        let mut fields = BTreeMap::new();
        if matches!(self.data.first().map(|b| b & 7), Some(4 | 6 | 7)) {
            return fields;
        }
        while probe.position < probe.length() {
            let step = probe.tag().and_then(|tag| {
                fields.insert(tag.field, tag.wire_type);
                probe.skip_type(tag.wire_type)
            });
            if let Err(err) = step {
                trace!(%err, "no flat signature");
                fields.clear();
                break;
            }
        }
        fields
    }
}
