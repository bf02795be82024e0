//! Limb arithmetic shared by [`Int64`](super::Int64) and [`Uint64`](super::Uint64).
//!
//! A 64-bit quantity is held as two `u32` halves. Addition and
//! multiplication split those halves into four 16-bit limbs so every partial
//! result fits in a `u32` and carries can be propagated by hand.

use std::cmp::Ordering;

/// 2^32 as a float
const TWO_POW_32: f64 = 4_294_967_296.0;

/// 2^64 as a float
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Operands below this magnitude divide exactly in `f64`
const POW_24: u32 = 1 << 24;

/// Raw two's complement bit pattern, no signedness attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Bits {
    pub(crate) low: u32,
    pub(crate) high: u32,
}

impl Bits {
    pub(crate) const ZERO: Bits = Bits::new(0, 0);
    pub(crate) const ONE: Bits = Bits::new(1, 0);

    pub(crate) const fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    fn limbs(self) -> [u32; 4] {
        [
            self.low & 0xFFFF,
            self.low >> 16,
            self.high & 0xFFFF,
            self.high >> 16,
        ]
    }

    fn from_limbs(limbs: [u32; 4]) -> Self {
        Self::new((limbs[1] << 16) | limbs[0], (limbs[3] << 16) | limbs[2])
    }

    pub(crate) fn is_zero(self) -> bool {
        self.low == 0 && self.high == 0
    }

    pub(crate) fn sign_bit(self) -> bool {
        self.high >> 31 == 1
    }

    pub(crate) fn not(self) -> Self {
        Self::new(!self.low, !self.high)
    }

    /// Two's complement negation, wrapping
    pub(crate) fn negate(self) -> Self {
        self.not().add(Self::ONE)
    }

    pub(crate) fn add(self, other: Self) -> Self {
        let a = self.limbs();
        let b = other.limbs();
        let mut c = [0u32; 4];
        let mut carry = 0;
        for i in 0..4 {
            let sum = a[i] + b[i] + carry;
            c[i] = sum & 0xFFFF;
            carry = sum >> 16;
        }
        Self::from_limbs(c)
    }

    pub(crate) fn sub(self, other: Self) -> Self {
        self.add(other.negate())
    }

    /// Wrapping product plus a flag telling whether the true unsigned
    /// product needed more than 64 bits.
    pub(crate) fn mul(self, other: Self) -> (Self, bool) {
        if self.is_zero() || other.is_zero() {
            return (Self::ZERO, false);
        }
        if self.high == 0 && other.high == 0 && self.low < POW_24 && other.low < POW_24 {
            // < 2^48, exact in a double
            return (Self::from_f64(self.low as f64 * other.low as f64), false);
        }

        let a = self.limbs();
        let b = other.limbs();
        let mut c = [0u32; 4];
        let mut overflow = false;
        for i in 0..4 {
            // carry stays below 2^16, so column sums never exceed u32::MAX
            let mut carry = 0u32;
            for j in 0..4 {
                let product = a[i] * b[j];
                if i + j >= 4 {
                    overflow |= product != 0;
                    continue;
                }
                let sum = c[i + j] + product + carry;
                c[i + j] = sum & 0xFFFF;
                carry = sum >> 16;
            }
            overflow |= carry != 0;
        }
        (Self::from_limbs(c), overflow)
    }

    /// Unsigned comparison of the two halves
    pub(crate) fn ucmp(self, other: Self) -> Ordering {
        self.high
            .cmp(&other.high)
            .then_with(|| self.low.cmp(&other.low))
    }

    /// Logical shift right by one
    pub(crate) fn shr1(self) -> Self {
        Self::new((self.low >> 1) | (self.high << 31), self.high >> 1)
    }

    pub(crate) fn to_f64_unsigned(self) -> f64 {
        self.high as f64 * TWO_POW_32 + self.low as f64
    }

    pub(crate) fn to_f64_signed(self) -> f64 {
        (self.high as i32) as f64 * TWO_POW_32 + self.low as f64
    }

    /// Truncates a non-negative float into bits, saturating at 2^64 - 1
    pub(crate) fn from_f64(value: f64) -> Self {
        if value.is_nan() || value <= 0.0 {
            return Self::ZERO;
        }
        if value >= TWO_POW_64 {
            return Self::new(u32::MAX, u32::MAX);
        }
        let value = value.trunc();
        let high = (value / TWO_POW_32).floor();
        let low = value - high * TWO_POW_32;
        Self::new(low as u32, high as u32)
    }

    /// Unsigned quotient. The divisor must not be zero.
    pub(crate) fn udiv(self, divisor: Self) -> Self {
        debug_assert!(!divisor.is_zero());
        if self.is_zero() {
            return Self::ZERO;
        }
        if self.high == 0 && divisor.high == 0 && self.low < POW_24 && divisor.low < POW_24 {
            let quotient = (self.low as f64 / divisor.low as f64).floor();
            return Self::new(quotient as u32, 0);
        }
        if divisor.ucmp(self) == Ordering::Greater {
            return Self::ZERO;
        }
        if divisor.ucmp(self.shr1()) == Ordering::Greater {
            return Self::ONE;
        }

        let divisor_f = divisor.to_f64_unsigned();
        let mut result = Self::ZERO;
        let mut remainder = self;
        while remainder.ucmp(divisor) != Ordering::Less {
            let mut approx = (remainder.to_f64_unsigned() / divisor_f).floor().max(1.0);
            let log2 = approx.log2().ceil();
            let delta = if log2 <= 48.0 {
                1.0
            } else {
                2f64.powf(log2 - 48.0)
            };

            let mut approx_result = Self::from_f64(approx);
            let (mut approx_remainder, mut overflow) = approx_result.mul(divisor);
            while overflow || approx_remainder.ucmp(remainder) == Ordering::Greater {
                approx = (approx - delta).max(1.0);
                approx_result = Self::from_f64(approx);
                (approx_remainder, overflow) = approx_result.mul(divisor);
            }

            result = result.add(approx_result);
            remainder = remainder.sub(approx_remainder);
        }
        result
    }

    /// Formats the unsigned value in `radix` (2..=36, checked by callers)
    pub(crate) fn to_radix_string(self, radix: u32) -> String {
        if self.high == 0 {
            return format_u32(self.low, radix);
        }
        // largest chunk that stays exact in a double for every radix up to 36
        let power = Self::new(radix.pow(6), 0);
        let mut remainder = self;
        let mut result = String::new();
        loop {
            let quotient = remainder.udiv(power);
            let chunk = remainder.sub(quotient.mul(power).0).low;
            let digits = format_u32(chunk, radix);
            remainder = quotient;
            if remainder.is_zero() {
                return digits + &result;
            }
            result = format!("{:0>6}{}", digits, result);
        }
    }

    /// Parses unsigned digits in `radix`; `None` on a bad digit or overflow
    pub(crate) fn parse_radix(digits: &str, radix: u32) -> Option<Self> {
        if digits.is_empty() || !(2..=36).contains(&radix) {
            return None;
        }
        let base = Self::new(radix, 0);
        let mut value = Self::ZERO;
        for c in digits.chars() {
            if c == '_' {
                continue;
            }
            let digit = c.to_digit(radix)?;
            let (shifted, overflow) = value.mul(base);
            if overflow {
                return None;
            }
            let next = shifted.add(Self::new(digit, 0));
            if next.ucmp(shifted) == Ordering::Less {
                return None;
            }
            value = next;
        }
        Some(value)
    }
}

fn format_u32(mut value: u32, radix: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        // radix <= 36, so from_digit always succeeds
        digits.push(char::from_digit(value % radix, radix).unwrap_or('?'));
        value /= radix;
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(value: u64) -> Bits {
        Bits::new(value as u32, (value >> 32) as u32)
    }

    fn value(bits: Bits) -> u64 {
        ((bits.high as u64) << 32) | bits.low as u64
    }

    #[test]
    fn test_add_carries_across_limbs() {
        assert_eq!(value(bits(0xFFFF).add(Bits::ONE)), 0x1_0000);
        assert_eq!(value(bits(0xFFFF_FFFF).add(Bits::ONE)), 0x1_0000_0000);
        assert_eq!(value(bits(u64::MAX).add(Bits::ONE)), 0);
    }

    #[test]
    fn test_mul_overflow_flag() {
        let (product, overflow) = bits(1 << 32).mul(bits(1 << 31));
        assert_eq!(value(product), 1 << 63);
        assert!(!overflow);

        let (product, overflow) = bits(1 << 32).mul(bits(1 << 32));
        assert_eq!(value(product), 0);
        assert!(overflow);

        let (_, overflow) = bits(u64::MAX).mul(bits(2));
        assert!(overflow);
    }

    #[test]
    fn test_udiv_edges() {
        assert_eq!(value(bits(u64::MAX).udiv(bits(3))), u64::MAX / 3);
        assert_eq!(value(bits(u64::MAX).udiv(Bits::ONE)), u64::MAX);
        assert_eq!(value(bits(u64::MAX).udiv(bits(u64::MAX))), 1);
        assert_eq!(value(bits(1 << 63).udiv(bits(7))), (1u64 << 63) / 7);
        assert_eq!(value(bits(100).udiv(bits(7))), 14);
    }

    #[test]
    fn test_to_radix_string_pads_interior_chunks() {
        assert_eq!(bits(10_000_000_000_000_001).to_radix_string(10), "10000000000000001");
        assert_eq!(bits(u64::MAX).to_radix_string(16), "ffffffffffffffff");
        assert_eq!(bits(u64::MAX).to_radix_string(36), "3w5e11264sgsf");
    }

    #[test]
    fn test_parse_radix() {
        assert_eq!(Bits::parse_radix("18446744073709551615", 10), Some(bits(u64::MAX)));
        assert_eq!(Bits::parse_radix("18446744073709551616", 10), None);
        assert_eq!(Bits::parse_radix("1z", 10), None);
        assert_eq!(Bits::parse_radix("", 10), None);
    }
}
