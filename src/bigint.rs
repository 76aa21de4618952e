//! Arbitrary-precision integers for CBOR bignum tags 2 and 3.
//!
//! A [`BigInt`] stores the mathematical value as a sign plus a minimal
//! big-endian magnitude (no leading zeros; zero is the empty magnitude).
//! The wire form of a negative bignum is offset by one (`tag 3` content `n`
//! encodes `-1 - n`), so conversion to and from tag content goes through
//! the byte-wise increment/decrement helpers below.

use core::fmt;

use crate::Error;

/// An arbitrary-precision integer (CBOR tag 2 / tag 3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInt {
    negative: bool,
    magnitude: Vec<u8>,
}

impl BigInt {
    /// Construct from a sign and a big-endian magnitude.
    ///
    /// Leading zero bytes are stripped; a zero magnitude yields the
    /// canonical non-negative zero regardless of `negative`.
    #[must_use]
    pub fn from_sign_magnitude(negative: bool, magnitude: impl Into<Vec<u8>>) -> Self {
        let magnitude = strip_leading_zeros(magnitude.into());
        if magnitude.is_empty() {
            return Self {
                negative: false,
                magnitude,
            };
        }
        Self {
            negative,
            magnitude,
        }
    }

    /// Sign flag: `true` for values below zero.
    #[inline]
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.negative
    }

    /// Returns `true` for the zero value.
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.magnitude.is_empty()
    }

    /// The minimal big-endian magnitude of the absolute value.
    #[inline]
    #[must_use]
    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    /// The value as `u64`, when representable.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        if self.negative {
            return None;
        }
        be_to_u128(&self.magnitude).and_then(|v| u64::try_from(v).ok())
    }

    /// The value as `i64`, when representable.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        i64::try_from(self.to_i128()?).ok()
    }

    /// The value as `u128`, when representable.
    #[must_use]
    pub fn to_u128(&self) -> Option<u128> {
        if self.negative {
            return None;
        }
        be_to_u128(&self.magnitude)
    }

    /// The value as `i128`, when representable.
    #[must_use]
    pub fn to_i128(&self) -> Option<i128> {
        let mag = be_to_u128(&self.magnitude)?;
        if self.negative {
            // i128::MIN's magnitude is 1 << 127, one above i128::MAX.
            if mag > (1u128 << 127) {
                return None;
            }
            if mag == (1u128 << 127) {
                return Some(i128::MIN);
            }
            Some(-(mag as i128))
        } else {
            i128::try_from(mag).ok()
        }
    }

    /// The major-type-1 argument `n` (value `= -1 - n`), when the value is
    /// negative and representable as a native CBOR negative integer.
    pub(crate) fn to_nint_arg(&self) -> Option<u64> {
        if !self.negative {
            return None;
        }
        let n = be_decrement(&self.magnitude);
        be_to_u128(&n).and_then(|v| u64::try_from(v).ok())
    }

    /// Convert tag 2/3 content bytes into the mathematical value.
    pub(crate) fn from_wire(negative: bool, content: &[u8]) -> Self {
        let content = strip_leading_zeros(content.to_vec());
        if negative {
            Self {
                negative: true,
                magnitude: be_increment(&content),
            }
        } else {
            Self {
                negative: false,
                magnitude: content,
            }
        }
    }

    /// Split into tag 2/3 wire parts: the tag sign and the content bytes.
    ///
    /// # Errors
    ///
    /// Never fails today; the `Result` keeps the signature aligned with the
    /// encoder's fallible writer path.
    pub(crate) fn wire_parts(&self) -> Result<(bool, Vec<u8>), Error> {
        if self.negative {
            Ok((true, be_decrement(&self.magnitude)))
        } else {
            Ok((false, self.magnitude.clone()))
        }
    }
}

impl Default for BigInt {
    /// The zero value.
    fn default() -> Self {
        Self {
            negative: false,
            magnitude: Vec::new(),
        }
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.magnitude.is_empty() {
            return write!(f, "0x0");
        }
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "0x")?;
        for (i, b) in self.magnitude.iter().enumerate() {
            if i == 0 {
                write!(f, "{b:x}")?;
            } else {
                write!(f, "{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl From<u64> for BigInt {
    fn from(v: u64) -> Self {
        Self::from_sign_magnitude(false, v.to_be_bytes().to_vec())
    }
}

impl From<i64> for BigInt {
    fn from(v: i64) -> Self {
        Self::from_sign_magnitude(v < 0, v.unsigned_abs().to_be_bytes().to_vec())
    }
}

impl From<u128> for BigInt {
    fn from(v: u128) -> Self {
        Self::from_sign_magnitude(false, v.to_be_bytes().to_vec())
    }
}

impl From<i128> for BigInt {
    fn from(v: i128) -> Self {
        Self::from_sign_magnitude(v < 0, v.unsigned_abs().to_be_bytes().to_vec())
    }
}

fn strip_leading_zeros(mut bytes: Vec<u8>) -> Vec<u8> {
    let nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    if nonzero > 0 {
        bytes.drain(..nonzero);
    }
    bytes
}

fn be_to_u128(bytes: &[u8]) -> Option<u128> {
    if bytes.len() > 16 {
        return None;
    }
    let mut buf = [0u8; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Some(u128::from_be_bytes(buf))
}

/// Big-endian `bytes + 1`; grows by one byte on full carry.
fn be_increment(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    for b in out.iter_mut().rev() {
        if *b == 0xff {
            *b = 0;
        } else {
            *b += 1;
            return out;
        }
    }
    let mut grown = Vec::with_capacity(out.len() + 1);
    grown.push(1);
    grown.extend_from_slice(&out);
    grown
}

/// Big-endian `bytes - 1`; callers guarantee a non-zero input.
fn be_decrement(bytes: &[u8]) -> Vec<u8> {
    debug_assert!(bytes.iter().any(|&b| b != 0));
    let mut out = bytes.to_vec();
    for b in out.iter_mut().rev() {
        if *b == 0 {
            *b = 0xff;
        } else {
            *b -= 1;
            break;
        }
    }
    strip_leading_zeros(out)
}

#[cfg(test)]
mod tests {
    use super::BigInt;

    #[test]
    fn zero_is_canonical() {
        let z = BigInt::from_sign_magnitude(true, vec![0, 0]);
        assert!(z.is_zero());
        assert!(!z.is_negative());
        assert_eq!(z, BigInt::from(0u64));
    }

    #[test]
    fn wire_offset_for_negatives() {
        // -18446744073709551616 = -(1 << 64) is tag 3 with content 2^64 - 1.
        let v = BigInt::from(-(1i128 << 64));
        let (negative, content) = v.wire_parts().unwrap();
        assert!(negative);
        assert_eq!(content, vec![0xff; 8]);
        assert_eq!(BigInt::from_wire(true, &content), v);
    }

    #[test]
    fn wire_carry_across_byte_boundary() {
        // tag 3 content 0xff ff -> value -(0x1_00_00) = -65536.
        let v = BigInt::from_wire(true, &[0xff, 0xff]);
        assert_eq!(v, BigInt::from(-65_536i64));
        let (negative, content) = v.wire_parts().unwrap();
        assert!(negative);
        assert_eq!(content, vec![0xff, 0xff]);
    }

    #[test]
    fn native_conversions() {
        assert_eq!(BigInt::from(u64::MAX).to_u64(), Some(u64::MAX));
        assert_eq!(BigInt::from(-1i64).to_i64(), Some(-1));
        assert_eq!(BigInt::from(i64::MIN).to_i64(), Some(i64::MIN));
        assert_eq!(BigInt::from(1u128 << 64).to_u64(), None);
        assert_eq!(BigInt::from(i128::MIN).to_i128(), Some(i128::MIN));
        assert_eq!(BigInt::from(-1i64).to_u64(), None);
    }

    #[test]
    fn nint_arg_boundary() {
        // -2^64 is the most negative native CBOR integer.
        assert_eq!(BigInt::from(-(1i128 << 64)).to_nint_arg(), Some(u64::MAX));
        assert_eq!(BigInt::from((-(1i128 << 64)) - 1).to_nint_arg(), None);
        assert_eq!(BigInt::from(-1i64).to_nint_arg(), Some(0));
    }

    #[test]
    fn display_is_signed_hex() {
        assert_eq!(BigInt::from(0u64).to_string(), "0x0");
        assert_eq!(BigInt::from(255u64).to_string(), "0xff");
        assert_eq!(BigInt::from(-4096i64).to_string(), "-0x1000");
    }
}
