//! Fixed-width value formats that have no native Rust reader.
//!
//! Tensor payloads in model files carry IEEE half floats, bfloat16,
//! complex pairs and bit-packed integers. The helpers here read and write
//! them at an explicit offset with an explicit byte order; [`ByteCursor`]
//! builds its sequential accessors on top.
//!
//! [`ByteCursor`]: crate::cursor::ByteCursor

use crate::error::{Error, Result};
use std::fmt;

/// Byte order of a fixed-width value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Least significant byte first
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

/// A complex number stored as two consecutive floats
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex<T> {
    /// Real part
    pub real: T,
    /// Imaginary part
    pub imaginary: T,
}

/// Two `f32` halves, 8 bytes
pub type Complex64 = Complex<f32>;

/// Two `f64` halves, 16 bytes
pub type Complex128 = Complex<f64>;

impl<T> Complex<T> {
    /// Creates a complex number
    pub fn new(real: T, imaginary: T) -> Self {
        Self { real, imaginary }
    }
}

impl<T: fmt::Display> fmt::Display for Complex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}i", self.real, self.imaginary)
    }
}

/// Expands IEEE 754 half precision bits to `f32`
pub fn f16_to_f32(value: u16) -> f32 {
    let exponent = ((value & 0x7C00) >> 10) as i32;
    let fraction = (value & 0x03FF) as f32;
    let magnitude = match exponent {
        0 => fraction * 2f32.powi(-24),
        0x1F if fraction != 0.0 => f32::NAN,
        0x1F => f32::INFINITY,
        _ => 2f32.powi(exponent - 15) * (1.0 + fraction / 1024.0),
    };
    if value & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Narrows `f32` to IEEE 754 half precision bits, truncating the mantissa
pub fn f32_to_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = (bits >> 16) & 0x8000;
    let biased = ((bits >> 23) & 0xFF) as i32;
    let fraction = bits & 0x007F_FFFF;
    if biased == 0xFF && fraction != 0 {
        return (sign | 0x7E00) as u16;
    }

    let exponent = biased - 127;
    let (base, shift) = if exponent < -27 {
        (0, 24)
    } else if exponent < -14 {
        // subnormal half: keep the implicit bit in the mantissa
        (0x0400 >> (-exponent - 14), (-exponent - 1) as u32)
    } else if exponent <= 15 {
        (((exponent + 15) as u32) << 10, 13)
    } else {
        (0x7C00, 24)
    };
    (sign | base | (fraction >> shift)) as u16
}

/// Expands bfloat16 bits to `f32`
pub fn bf16_to_f32(value: u16) -> f32 {
    f32::from_bits((value as u32) << 16)
}

/// Narrows `f32` to bfloat16 bits by truncation
pub fn f32_to_bf16(value: f32) -> u16 {
    (value.to_bits() >> 16) as u16
}

fn window<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..)
        .and_then(|rest| rest.get(..N))
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| Error::unexpected_eof(offset, (offset + N).saturating_sub(data.len())))
}

fn window_mut<const N: usize>(data: &mut [u8], offset: usize) -> Result<&mut [u8]> {
    let length = data.len();
    data.get_mut(offset..)
        .and_then(|rest| rest.get_mut(..N))
        .ok_or_else(|| Error::unexpected_eof(offset, (offset + N).saturating_sub(length)))
}

fn read_u16(data: &[u8], offset: usize, endian: Endian) -> Result<u16> {
    let bytes = window::<2>(data, offset)?;
    Ok(match endian {
        Endian::Little => u16::from_le_bytes(bytes),
        Endian::Big => u16::from_be_bytes(bytes),
    })
}

fn write_u16(data: &mut [u8], offset: usize, value: u16, endian: Endian) -> Result<()> {
    let bytes = match endian {
        Endian::Little => value.to_le_bytes(),
        Endian::Big => value.to_be_bytes(),
    };
    window_mut::<2>(data, offset)?.copy_from_slice(&bytes);
    Ok(())
}

/// Reads a half float at `offset`
pub fn read_float16(data: &[u8], offset: usize, endian: Endian) -> Result<f32> {
    read_u16(data, offset, endian).map(f16_to_f32)
}

/// Writes a half float at `offset`
pub fn write_float16(data: &mut [u8], offset: usize, value: f32, endian: Endian) -> Result<()> {
    write_u16(data, offset, f32_to_f16(value), endian)
}

/// Reads a bfloat16 at `offset`
pub fn read_bfloat16(data: &[u8], offset: usize, endian: Endian) -> Result<f32> {
    read_u16(data, offset, endian).map(bf16_to_f32)
}

/// Writes a bfloat16 at `offset`
pub fn write_bfloat16(data: &mut [u8], offset: usize, value: f32, endian: Endian) -> Result<()> {
    write_u16(data, offset, f32_to_bf16(value), endian)
}

/// Reads two `f32` values at `offset`.
///
/// Big-endian data stores the pair byte-reversed as a whole, so the
/// imaginary part comes first.
pub fn read_complex64(data: &[u8], offset: usize, endian: Endian) -> Result<Complex64> {
    let bytes = window::<8>(data, offset)?;
    let (a, b) = bytes.split_at(4);
    let (a, b) = ([a[0], a[1], a[2], a[3]], [b[0], b[1], b[2], b[3]]);
    Ok(match endian {
        Endian::Little => Complex::new(f32::from_le_bytes(a), f32::from_le_bytes(b)),
        Endian::Big => Complex::new(f32::from_be_bytes(b), f32::from_be_bytes(a)),
    })
}

/// Writes two `f32` values at `offset`
pub fn write_complex64(data: &mut [u8], offset: usize, value: Complex64, endian: Endian) -> Result<()> {
    let target = window_mut::<8>(data, offset)?;
    match endian {
        Endian::Little => {
            target[..4].copy_from_slice(&value.real.to_le_bytes());
            target[4..].copy_from_slice(&value.imaginary.to_le_bytes());
        }
        Endian::Big => {
            target[..4].copy_from_slice(&value.imaginary.to_be_bytes());
            target[4..].copy_from_slice(&value.real.to_be_bytes());
        }
    }
    Ok(())
}

/// Reads two `f64` values at `offset`
pub fn read_complex128(data: &[u8], offset: usize, endian: Endian) -> Result<Complex128> {
    let bytes = window::<16>(data, offset)?;
    let mut a = [0u8; 8];
    let mut b = [0u8; 8];
    a.copy_from_slice(&bytes[..8]);
    b.copy_from_slice(&bytes[8..]);
    Ok(match endian {
        Endian::Little => Complex::new(f64::from_le_bytes(a), f64::from_le_bytes(b)),
        Endian::Big => Complex::new(f64::from_be_bytes(b), f64::from_be_bytes(a)),
    })
}

/// Writes two `f64` values at `offset`
pub fn write_complex128(data: &mut [u8], offset: usize, value: Complex128, endian: Endian) -> Result<()> {
    let target = window_mut::<16>(data, offset)?;
    match endian {
        Endian::Little => {
            target[..8].copy_from_slice(&value.real.to_le_bytes());
            target[8..].copy_from_slice(&value.imaginary.to_le_bytes());
        }
        Endian::Big => {
            target[..8].copy_from_slice(&value.imaginary.to_be_bytes());
            target[8..].copy_from_slice(&value.real.to_be_bytes());
        }
    }
    Ok(())
}

/// Reads element `index` of a packed array of `bits`-wide unsigned
/// integers (1..=32 bits, most significant bit first). Other widths fail
/// with [`Error::InvalidBitWidth`].
pub fn uint_bits(data: &[u8], index: usize, bits: u32) -> Result<u32> {
    if !(1..=32).contains(&bits) {
        return Err(Error::InvalidBitWidth { bits });
    }
    let width = bits as usize;
    let total = data.len().saturating_mul(8);
    let mut offset = match index.checked_mul(width) {
        Some(offset) if offset <= total && width <= total - offset => offset,
        offset => {
            let start = offset.unwrap_or(usize::MAX).min(total);
            let missing = width - (total - start).min(width);
            return Err(Error::unexpected_eof(start / 8, missing.div_ceil(8)));
        }
    };
    let mut value = 0u32;
    let mut read = 0;
    while read < bits {
        let remainder = (offset & 7) as u32;
        let size = (bits - read).min(8 - remainder);
        let byte = data[offset >> 3] as u32;
        let mask = (1u32 << size) - 1;
        value = (value << size) | ((byte >> (8 - size - remainder)) & mask);
        offset += size as usize;
        read += size;
    }
    Ok(value)
}

/// Reads element `index` of a packed array of `bits`-wide two's complement
/// integers
pub fn int_bits(data: &[u8], index: usize, bits: u32) -> Result<i32> {
    let value = uint_bits(data, index, bits)?;
    let unused = 32 - bits;
    Ok(((value << unused) as i32) >> unused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_f16_known_values() {
        assert_eq!(f16_to_f32(0x3C00), 1.0);
        assert_eq!(f16_to_f32(0xC000), -2.0);
        assert_eq!(f16_to_f32(0x7BFF), 65504.0);
        assert_eq!(f16_to_f32(0x0001), 2f32.powi(-24));
        assert_eq!(f16_to_f32(0x7C00), f32::INFINITY);
        assert!(f16_to_f32(0x7E00).is_nan());

        assert_eq!(f32_to_f16(1.0), 0x3C00);
        assert_eq!(f32_to_f16(-2.0), 0xC000);
        assert_eq!(f32_to_f16(1e10), 0x7C00);
        assert_eq!(f32_to_f16(1e-10), 0x0000);
        assert_eq!(f32_to_f16(f32::NEG_INFINITY), 0xFC00);
        assert_eq!(f32_to_f16(f32::NAN) & 0x7E00, 0x7E00);
    }

    #[test]
    fn test_bf16() {
        assert_eq!(bf16_to_f32(0x3F80), 1.0);
        assert_eq!(f32_to_bf16(-1.5), 0xBFC0);
        assert_eq!(bf16_to_f32(f32_to_bf16(3.140625)), 3.140625);
    }

    #[test]
    fn test_half_read_write_both_orders() {
        let mut buffer = [0u8; 4];
        write_float16(&mut buffer, 0, 0.5, Endian::Little).unwrap();
        write_float16(&mut buffer, 2, 0.5, Endian::Big).unwrap();
        assert_eq!(buffer, [0x00, 0x38, 0x38, 0x00]);
        assert_eq!(read_float16(&buffer, 2, Endian::Big).unwrap(), 0.5);
        assert!(read_float16(&buffer, 3, Endian::Little).is_err());
        assert!(write_bfloat16(&mut buffer, 3, 1.0, Endian::Little).is_err());
    }

    #[test]
    fn test_complex_round_trip() {
        let mut buffer = [0u8; 24];
        let small = Complex64::new(1.5, -2.0);
        let wide = Complex128::new(0.25, 8.0);
        write_complex64(&mut buffer, 0, small, Endian::Big).unwrap();
        write_complex128(&mut buffer, 8, wide, Endian::Little).unwrap();
        assert_eq!(read_complex64(&buffer, 0, Endian::Big).unwrap(), small);
        assert_eq!(read_complex128(&buffer, 8, Endian::Little).unwrap(), wide);
        assert_eq!(&buffer[..4], &(-2.0f32).to_be_bytes());
        assert_eq!(small.to_string(), "1.5 + -2i");
        assert!(read_complex128(&buffer, 9, Endian::Little).is_err());
    }

    #[test]
    fn test_bit_packed() {
        let data = [0b1011_0010, 0b1111_0000];
        assert_eq!(uint_bits(&data, 0, 4).unwrap(), 0b1011);
        assert_eq!(uint_bits(&data, 1, 4).unwrap(), 0b0010);
        assert_eq!(uint_bits(&data, 1, 3).unwrap(), 0b100);
        assert_eq!(uint_bits(&data, 0, 16).unwrap(), 0b1011_0010_1111_0000);
        assert_eq!(int_bits(&data, 0, 4).unwrap(), -5);
        assert_eq!(int_bits(&data, 1, 4).unwrap(), 2);
        assert!(uint_bits(&data, 4, 4).is_err());
        assert_eq!(uint_bits(&[0xFF; 4], 0, 32).unwrap(), u32::MAX);
    }

    #[test]
    fn test_bit_width_and_index_limits() {
        assert_eq!(int_bits(&[0xFF], 0, 0).unwrap_err(), Error::InvalidBitWidth { bits: 0 });
        assert_eq!(
            uint_bits(&[0xFF; 8], 0, 40).unwrap_err(),
            Error::InvalidBitWidth { bits: 40 }
        );
        assert!(uint_bits(&[0xFF; 8], usize::MAX, 8).unwrap_err().is_bounds());
        assert!(uint_bits(&[0xFF; 8], usize::MAX / 4, 8).unwrap_err().is_bounds());
        assert!(int_bits(&[], 0, 1).unwrap_err().is_bounds());
        assert_eq!(int_bits(&[0x80], 0, 1).unwrap(), -1);
    }

    proptest! {
        #[test]
        fn finite_halves_round_trip(bits in any::<u16>()) {
            let value = f16_to_f32(bits);
            prop_assume!(!value.is_nan());
            prop_assert_eq!(f32_to_f16(value), bits);
        }
    }
}
