//! Bounds-checked cursor for container framing.
//!
//! Model files wrap their wire-encoded payloads in simple little-endian
//! containers (headers, offset tables, tensor blobs). [`ByteCursor`] reads
//! those, leaving the wire codec to [`BinaryReader`](crate::wire::BinaryReader).
//!
//! Every operation either succeeds completely or fails with
//! [`Error::UnexpectedEof`] and leaves the position where it was.

use crate::error::{Error, Result};
use crate::typed::{self, Complex128, Complex64, Endian};
use crate::wide::{Int64, Uint64};
use bytes::Bytes;

/// Largest integer a double represents exactly (2^53 - 1)
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Random-access reader over a shared, immutable byte buffer
#[derive(Debug, Clone)]
pub struct ByteCursor {
    data: Bytes,
    position: usize,
}

impl ByteCursor {
    /// Creates a cursor at position zero
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    /// Total number of bytes
    pub fn length(&self) -> usize {
        self.data.len()
    }

    /// Current offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left after the current offset
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn out_of_bounds(&self, target: usize) -> Error {
        Error::unexpected_eof(self.position, target.saturating_sub(self.data.len()))
    }

    /// Moves to an absolute offset
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(self.out_of_bounds(position));
        }
        self.position = position;
        Ok(())
    }

    /// Moves to `offset` bytes before the end
    pub fn seek_from_end(&mut self, offset: usize) -> Result<()> {
        let position = self
            .data
            .len()
            .checked_sub(offset)
            .ok_or_else(|| Error::unexpected_eof(self.position, offset - self.data.len()))?;
        self.seek(position)
    }

    /// Moves relative to the current offset
    pub fn skip(&mut self, offset: isize) -> Result<()> {
        let position = self
            .position
            .checked_add_signed(offset)
            .ok_or_else(|| Error::unexpected_eof(self.position, offset.unsigned_abs() - self.position))?;
        self.seek(position)
    }

    /// Advances to the next multiple of `modulus`
    pub fn align(&mut self, modulus: usize) -> Result<()> {
        if modulus <= 1 {
            return Ok(());
        }
        let misalignment = self.position % modulus;
        if misalignment != 0 {
            self.skip((modulus - misalignment) as isize)?;
        }
        Ok(())
    }

    fn end_of(&self, length: Option<usize>) -> Result<usize> {
        let end = match length {
            Some(length) => self.position.saturating_add(length),
            None => self.data.len(),
        };
        if end > self.data.len() {
            return Err(self.out_of_bounds(end));
        }
        Ok(end)
    }

    /// The next `length` bytes (or the rest) without moving
    pub fn peek(&self, length: Option<usize>) -> Result<Bytes> {
        let end = self.end_of(length)?;
        Ok(self.data.slice(self.position..end))
    }

    /// The next `length` bytes (or the rest)
    pub fn read(&mut self, length: Option<usize>) -> Result<Bytes> {
        let end = self.end_of(length)?;
        let bytes = self.data.slice(self.position..end);
        self.position = end;
        Ok(bytes)
    }

    fn window<const N: usize>(&self) -> Result<[u8; N]> {
        let end = self.end_of(Some(N))?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[self.position..end]);
        Ok(bytes)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.window::<N>()?;
        self.position += N;
        Ok(bytes)
    }

    /// Unsigned byte
    pub fn byte(&mut self) -> Result<u8> {
        self.take::<1>().map(|b| b[0])
    }

    /// Signed byte
    pub fn int8(&mut self) -> Result<i8> {
        self.take::<1>().map(i8::from_le_bytes)
    }

    /// Little-endian `i16`
    pub fn int16(&mut self) -> Result<i16> {
        self.take::<2>().map(i16::from_le_bytes)
    }

    /// Little-endian `i32`
    pub fn int32(&mut self) -> Result<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    /// Little-endian signed 64-bit value
    pub fn int64(&mut self) -> Result<Int64> {
        self.take::<8>().map(|b| Int64::from(i64::from_le_bytes(b)))
    }

    /// Little-endian `u16`
    pub fn uint16(&mut self) -> Result<u16> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    /// Little-endian `u32`
    pub fn uint32(&mut self) -> Result<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    /// Little-endian `u64` that must fit in 53 bits.
    ///
    /// Fails with [`Error::UnsafeInteger`] otherwise; use
    /// [`ByteCursor::uint64_wide`] for the full range.
    pub fn uint64(&mut self) -> Result<u64> {
        let value = u64::from_le_bytes(self.window::<8>()?);
        if value > MAX_SAFE_INTEGER {
            return Err(Error::UnsafeInteger {
                offset: self.position,
            });
        }
        self.position += 8;
        Ok(value)
    }

    /// Little-endian unsigned 64-bit value, exact
    pub fn uint64_wide(&mut self) -> Result<Uint64> {
        self.take::<8>().map(|b| Uint64::from(u64::from_le_bytes(b)))
    }

    /// Little-endian `f32`
    pub fn float32(&mut self) -> Result<f32> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    /// Little-endian `f64`
    pub fn float64(&mut self) -> Result<f64> {
        self.take::<8>().map(f64::from_le_bytes)
    }

    /// String prefixed by its `u32` byte length; invalid UTF-8 is replaced
    pub fn string(&mut self) -> Result<String> {
        let start = self.position;
        let length = self.uint32()? as usize;
        match self.read(Some(length)) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) => {
                self.position = start;
                Err(err)
            }
        }
    }

    /// Any non-zero byte is true
    pub fn boolean(&mut self) -> Result<bool> {
        self.byte().map(|b| b != 0)
    }

    /// Little-endian IEEE half float
    pub fn float16(&mut self) -> Result<f32> {
        let value = typed::read_float16(&self.data, self.position, Endian::Little)?;
        self.position += 2;
        Ok(value)
    }

    /// Little-endian bfloat16
    pub fn bfloat16(&mut self) -> Result<f32> {
        let value = typed::read_bfloat16(&self.data, self.position, Endian::Little)?;
        self.position += 2;
        Ok(value)
    }

    /// Two little-endian `f32` values
    pub fn complex64(&mut self) -> Result<Complex64> {
        let value = typed::read_complex64(&self.data, self.position, Endian::Little)?;
        self.position += 8;
        Ok(value)
    }

    /// Two little-endian `f64` values
    pub fn complex128(&mut self) -> Result<Complex128> {
        let value = typed::read_complex128(&self.data, self.position, Endian::Little)?;
        self.position += 16;
        Ok(value)
    }
}
