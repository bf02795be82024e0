//! 64-bit integers built from two 32-bit halves.
//!
//! Wire-format integers can use all 64 bits, and consumers that hand values
//! to a double-precision host (a viewer, a JSON emitter) need them kept apart
//! from lossy floats until the last moment. [`Int64`] and [`Uint64`] are the
//! value types the readers produce for every 64-bit field.
//!
//! Both types are immutable: every operation returns a new value.
//! Addition, subtraction and multiplication wrap modulo 2^64. Division
//! truncates toward zero and fails with [`Error::DivisionByZero`].
//!
//! ```
//! use wirelens_core::wide::Int64;
//!
//! let a = Int64::from(-7_i64);
//! let b = Int64::from(2_i64);
//! assert_eq!(a.divide(b)?.to_string(), "-3");
//! assert_eq!(Int64::MIN.negate(), Int64::MIN);
//! # Ok::<(), wirelens_core::Error>(())
//! ```

mod bits;

use crate::error::{Error, Result};
use bits::Bits;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Signed 64-bit two's complement integer
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Int64 {
    bits: Bits,
}

/// Unsigned 64-bit integer
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Uint64 {
    bits: Bits,
}

/// 2^63 as a float
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

impl Int64 {
    /// 0
    pub const ZERO: Int64 = Int64::new(0, 0);
    /// 1
    pub const ONE: Int64 = Int64::new(1, 0);
    /// -1
    pub const NEG_ONE: Int64 = Int64::new(u32::MAX, u32::MAX);
    /// -2^63
    pub const MIN: Int64 = Int64::new(0, 0x8000_0000);
    /// 2^63 - 1
    pub const MAX: Int64 = Int64::new(u32::MAX, 0x7FFF_FFFF);

    /// Creates a value from its low and high 32-bit halves
    pub const fn new(low: u32, high: u32) -> Self {
        Self {
            bits: Bits::new(low, high),
        }
    }

    const fn from_bits(bits: Bits) -> Self {
        Self { bits }
    }

    /// Converts a float, truncating toward zero.
    ///
    /// NaN becomes zero and out-of-range values saturate at [`Int64::MIN`]
    /// and [`Int64::MAX`].
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        if value <= -TWO_POW_63 {
            return Self::MIN;
        }
        if value >= TWO_POW_63 {
            return Self::MAX;
        }
        if value < 0.0 {
            return Self::from_f64(-value).negate();
        }
        Self::from_bits(Bits::from_f64(value))
    }

    /// Low 32 bits
    pub fn low(self) -> u32 {
        self.bits.low
    }

    /// High 32 bits
    pub fn high(self) -> u32 {
        self.bits.high
    }

    /// Returns true for zero
    pub fn is_zero(self) -> bool {
        self.bits.is_zero()
    }

    /// Returns true when the sign bit is set
    pub fn is_negative(self) -> bool {
        self.bits.sign_bit()
    }

    /// Two's complement negation. [`Int64::MIN`] is a fixed point.
    pub fn negate(self) -> Self {
        if self == Self::MIN {
            return Self::MIN;
        }
        Self::from_bits(self.bits.negate())
    }

    /// Bitwise complement
    pub fn not(self) -> Self {
        Self::from_bits(self.bits.not())
    }

    /// Wrapping addition
    pub fn add(self, other: Self) -> Self {
        Self::from_bits(self.bits.add(other.bits))
    }

    /// Wrapping subtraction
    pub fn subtract(self, other: Self) -> Self {
        Self::from_bits(self.bits.sub(other.bits))
    }

    /// Wrapping multiplication
    pub fn multiply(self, other: Self) -> Self {
        Self::from_bits(self.bits.mul(other.bits).0)
    }

    /// Quotient truncated toward zero. `MIN / -1` yields `MIN`.
    pub fn divide(self, other: Self) -> Result<Self> {
        if other.is_zero() {
            return Err(Error::DivisionByZero);
        }
        // MIN's magnitude is 2^63, which the unsigned kernel represents fine
        let quotient = self.magnitude().udiv(other.magnitude());
        if self.is_negative() != other.is_negative() {
            Ok(Self::from_bits(quotient.negate()))
        } else {
            Ok(Self::from_bits(quotient))
        }
    }

    fn magnitude(self) -> Bits {
        if self.is_negative() {
            self.bits.negate()
        } else {
            self.bits
        }
    }

    /// Structural equality of the two halves
    pub fn equals(self, other: Self) -> bool {
        self == other
    }

    /// Signed ordering
    pub fn compare(self, other: Self) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }
        match (self.is_negative(), other.is_negative()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ if self.subtract(other).is_negative() => Ordering::Less,
            _ => Ordering::Greater,
        }
    }

    /// Nearest double; exact while the magnitude fits in 53 bits
    pub fn to_number(self) -> f64 {
        self.bits.to_f64_signed()
    }

    /// Low 32 bits as a signed integer
    pub fn to_integer(self) -> i32 {
        self.bits.low as i32
    }

    /// Renders the value in `radix`, which must be within 2..=16
    pub fn to_string_radix(self, radix: u32) -> Result<String> {
        if !(2..=16).contains(&radix) {
            return Err(Error::RadixOutOfRange { radix });
        }
        Ok(self.format_radix(radix))
    }

    fn format_radix(self, radix: u32) -> String {
        if self.is_negative() {
            format!("-{}", self.magnitude().to_radix_string(radix))
        } else {
            self.bits.to_radix_string(radix)
        }
    }

    /// Parses an optionally signed integer in `radix` without going through
    /// floating point.
    pub fn from_str_radix(text: &str, radix: u32) -> Result<Self> {
        let invalid = || Error::InvalidInteger {
            text: text.to_string(),
        };
        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let magnitude = Bits::parse_radix(digits, radix).ok_or_else(invalid)?;
        let limit = Int64::MIN.bits;
        match magnitude.ucmp(limit) {
            Ordering::Greater => Err(invalid()),
            Ordering::Equal if !negative => Err(invalid()),
            _ if negative => Ok(Self::from_bits(magnitude.negate())),
            _ => Ok(Self::from_bits(magnitude)),
        }
    }

    /// Native value with the same bits
    pub fn to_i64(self) -> i64 {
        (((self.bits.high as u64) << 32) | self.bits.low as u64) as i64
    }

    /// Reinterprets the bits as unsigned
    pub fn to_unsigned(self) -> Uint64 {
        Uint64::from_bits(self.bits)
    }
}

impl Uint64 {
    /// 0
    pub const ZERO: Uint64 = Uint64::new(0, 0);
    /// 1
    pub const ONE: Uint64 = Uint64::new(1, 0);
    /// 2^64 - 1
    pub const MAX: Uint64 = Uint64::new(u32::MAX, u32::MAX);

    /// Creates a value from its low and high 32-bit halves
    pub const fn new(low: u32, high: u32) -> Self {
        Self {
            bits: Bits::new(low, high),
        }
    }

    const fn from_bits(bits: Bits) -> Self {
        Self { bits }
    }

    /// Converts a float, truncating toward zero.
    ///
    /// NaN and negative values become zero, values at or above 2^64
    /// saturate at [`Uint64::MAX`].
    pub fn from_f64(value: f64) -> Self {
        Self::from_bits(Bits::from_f64(value))
    }

    /// Low 32 bits
    pub fn low(self) -> u32 {
        self.bits.low
    }

    /// High 32 bits
    pub fn high(self) -> u32 {
        self.bits.high
    }

    /// Returns true for zero
    pub fn is_zero(self) -> bool {
        self.bits.is_zero()
    }

    /// Always false
    pub fn is_negative(self) -> bool {
        false
    }

    /// Two's complement negation modulo 2^64
    pub fn negate(self) -> Self {
        Self::from_bits(self.bits.negate())
    }

    /// Bitwise complement
    pub fn not(self) -> Self {
        Self::from_bits(self.bits.not())
    }

    /// Wrapping addition
    pub fn add(self, other: Self) -> Self {
        Self::from_bits(self.bits.add(other.bits))
    }

    /// Wrapping subtraction
    pub fn subtract(self, other: Self) -> Self {
        Self::from_bits(self.bits.sub(other.bits))
    }

    /// Wrapping multiplication
    pub fn multiply(self, other: Self) -> Self {
        Self::from_bits(self.bits.mul(other.bits).0)
    }

    /// Truncating quotient
    pub fn divide(self, other: Self) -> Result<Self> {
        if other.is_zero() {
            return Err(Error::DivisionByZero);
        }
        Ok(Self::from_bits(self.bits.udiv(other.bits)))
    }

    /// Structural equality of the two halves
    pub fn equals(self, other: Self) -> bool {
        self == other
    }

    /// Unsigned ordering
    pub fn compare(self, other: Self) -> Ordering {
        self.bits.ucmp(other.bits)
    }

    /// Nearest double; exact below 2^53
    pub fn to_number(self) -> f64 {
        self.bits.to_f64_unsigned()
    }

    /// Low 32 bits
    pub fn to_integer(self) -> u32 {
        self.bits.low
    }

    /// Renders the value in `radix`, which must be within 2..=36
    pub fn to_string_radix(self, radix: u32) -> Result<String> {
        if !(2..=36).contains(&radix) {
            return Err(Error::RadixOutOfRange { radix });
        }
        Ok(self.bits.to_radix_string(radix))
    }

    /// Parses an unsigned integer in `radix` (a leading `+` is accepted)
    pub fn from_str_radix(text: &str, radix: u32) -> Result<Self> {
        let digits = text.strip_prefix('+').unwrap_or(text);
        Bits::parse_radix(digits, radix)
            .map(Self::from_bits)
            .ok_or_else(|| Error::InvalidInteger {
                text: text.to_string(),
            })
    }

    /// Native value with the same bits
    pub fn to_u64(self) -> u64 {
        ((self.bits.high as u64) << 32) | self.bits.low as u64
    }

    /// Reinterprets the bits as signed
    pub fn to_signed(self) -> Int64 {
        Int64::from_bits(self.bits)
    }
}

impl From<i64> for Int64 {
    fn from(value: i64) -> Self {
        Self::new(value as u32, (value >> 32) as u32)
    }
}

impl From<i32> for Int64 {
    fn from(value: i32) -> Self {
        Self::from(value as i64)
    }
}

impl From<u64> for Uint64 {
    fn from(value: u64) -> Self {
        Self::new(value as u32, (value >> 32) as u32)
    }
}

impl From<u32> for Uint64 {
    fn from(value: u32) -> Self {
        Self::new(value, 0)
    }
}

impl From<Int64> for i64 {
    fn from(value: Int64) -> Self {
        value.to_i64()
    }
}

impl From<Uint64> for u64 {
    fn from(value: Uint64) -> Self {
        value.to_u64()
    }
}

impl fmt::Display for Int64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_radix(10))
    }
}

impl fmt::Display for Uint64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bits.to_radix_string(10))
    }
}

impl fmt::Debug for Int64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Int64({})", self)
    }
}

impl fmt::Debug for Uint64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uint64({})", self)
    }
}

impl FromStr for Int64 {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_str_radix(text, 10)
    }
}

impl FromStr for Uint64 {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_str_radix(text, 10)
    }
}

impl PartialOrd for Int64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Int64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(*other)
    }
}

impl PartialOrd for Uint64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Uint64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(*other)
    }
}

macro_rules! impl_wrapping_ops {
    ($ty:ident) => {
        impl std::ops::Add for $ty {
            type Output = $ty;

            fn add(self, rhs: $ty) -> $ty {
                $ty::add(self, rhs)
            }
        }

        impl std::ops::Sub for $ty {
            type Output = $ty;

            fn sub(self, rhs: $ty) -> $ty {
                self.subtract(rhs)
            }
        }

        impl std::ops::Mul for $ty {
            type Output = $ty;

            fn mul(self, rhs: $ty) -> $ty {
                self.multiply(rhs)
            }
        }

        impl std::ops::Neg for $ty {
            type Output = $ty;

            fn neg(self) -> $ty {
                self.negate()
            }
        }

        impl std::ops::Not for $ty {
            type Output = $ty;

            fn not(self) -> $ty {
                $ty::not(self)
            }
        }
    };
}

impl_wrapping_ops!(Int64);
impl_wrapping_ops!(Uint64);
