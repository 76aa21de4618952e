//! The generic CBOR value model.
//!
//! [`Value`] is the decode target when no native type is known, and an
//! encode source for dynamically assembled documents. Maps are ordered
//! sequences of pairs; the encoder applies the profile's sort order at
//! emission time, so insertion order is preserved until then.

use time::OffsetDateTime;

use crate::bigint::BigInt;
use crate::float;

/// Wire width of a CBOR floating-point item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    /// IEEE 754 binary16 (`0xf9`).
    F16,
    /// IEEE 754 binary32 (`0xfa`).
    F32,
    /// IEEE 754 binary64 (`0xfb`).
    F64,
}

/// A floating-point value that remembers its wire width.
///
/// Width matters: the `FloatMode::None` encoding policy re-emits a decoded
/// float at its original width with its original bits, including NaN
/// payloads. Equality is bit-and-width exact; use [`Float::value`] for
/// numeric comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Float {
    width: FloatWidth,
    bits: u64,
}

impl Float {
    /// Wrap an `f64`.
    #[must_use]
    pub fn from_f64(v: f64) -> Self {
        Self {
            width: FloatWidth::F64,
            bits: v.to_bits(),
        }
    }

    /// Wrap an `f32`.
    #[must_use]
    pub fn from_f32(v: f32) -> Self {
        Self {
            width: FloatWidth::F32,
            bits: u64::from(v.to_bits()),
        }
    }

    /// Wrap an IEEE 754 binary16 value.
    #[must_use]
    pub fn from_f16(v: half::f16) -> Self {
        Self {
            width: FloatWidth::F16,
            bits: u64::from(v.to_bits()),
        }
    }

    pub(crate) const fn from_width_bits(width: FloatWidth, bits: u64) -> Self {
        Self { width, bits }
    }

    /// The wire width this value was decoded at (or constructed with).
    #[inline]
    #[must_use]
    pub const fn width(self) -> FloatWidth {
        self.width
    }

    /// Raw IEEE 754 bits at [`Float::width`].
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.bits
    }

    /// The numeric value, widened losslessly to `f64`.
    ///
    /// NaN payloads survive the widening bit-exactly (left-aligned into the
    /// wider mantissa), matching the narrowing rules of the encoder.
    #[must_use]
    pub fn value(self) -> f64 {
        f64::from_bits(float::widen_to_f64(self.width, self.bits))
    }

    /// Returns `true` if the value is a NaN at its stored width.
    #[must_use]
    pub fn is_nan(self) -> bool {
        self.value().is_nan()
    }
}

impl From<f64> for Float {
    fn from(v: f64) -> Self {
        Self::from_f64(v)
    }
}

impl From<f32> for Float {
    fn from(v: f32) -> Self {
        Self::from_f32(v)
    }
}

/// A generic CBOR data item.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Major type 0: unsigned integer.
    Uint(u64),
    /// Major type 1 (or major type 0 under the signed decode policy).
    Int(i64),
    /// Major type 2: byte string.
    Bytes(Vec<u8>),
    /// Major type 3: UTF-8 text string.
    Text(String),
    /// Major type 4: ordered sequence.
    Array(Vec<Value>),
    /// Major type 5: ordered key/value pairs, in insertion order.
    Map(Vec<(Value, Value)>),
    /// Major type 6: a tag number wrapping a content item.
    Tag(u64, Box<Value>),
    /// Simple values `true`/`false`.
    Bool(bool),
    /// Major type 7 floating point, width-preserving.
    Float(Float),
    /// Tags 2/3: arbitrary-precision integer.
    BigInt(BigInt),
    /// Tags 0/1: date/time.
    Time(OffsetDateTime),
    /// An unassigned simple value (not bool/null/undefined).
    Simple(u8),
    /// Simple value null (`0xf6`).
    Null,
    /// Simple value undefined (`0xf7`).
    Undefined,
}

impl Value {
    /// CBOR type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Uint(_) => "positive integer",
            Self::Int(v) if *v >= 0 => "positive integer",
            Self::Int(_) => "negative integer",
            Self::Bytes(_) => "byte string",
            Self::Text(_) => "UTF-8 text string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Tag(..) => "tag",
            Self::BigInt(_) => "bignum",
            Self::Time(_) => "date/time",
            Self::Bool(_) | Self::Float(_) | Self::Simple(_) | Self::Null | Self::Undefined => {
                "primitives"
            }
        }
    }

    /// Returns `true` for `Null` and `Undefined`.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    /// Compact rendering used when a map key appears in an error message.
    #[must_use]
    pub(crate) fn key_string(&self) -> String {
        match self {
            Self::Uint(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Text(s) => format!("{s:?}"),
            Self::Bool(b) => b.to_string(),
            Self::BigInt(b) => b.to_string(),
            Self::Bytes(b) => {
                let mut out = String::with_capacity(2 + b.len() * 2);
                out.push_str("h'");
                for byte in b {
                    out.push_str(&format!("{byte:02x}"));
                }
                out.push('\'');
                out
            }
            other => format!("{other:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(Float::from_f64(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(Float::from_f32(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<Vec<(Value, Value)>> for Value {
    fn from(v: Vec<(Value, Value)>) -> Self {
        Self::Map(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Self::BigInt(v)
    }
}

impl From<Float> for Value {
    fn from(v: Float) -> Self {
        Self::Float(v)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(v: OffsetDateTime) -> Self {
        Self::Time(v)
    }
}

#[cfg(test)]
mod tests {
    use super::{Float, FloatWidth, Value};

    #[test]
    fn float_equality_is_width_exact() {
        assert_ne!(Float::from_f64(1.5), Float::from_f32(1.5));
        assert_eq!(Float::from_f32(1.5).value(), 1.5);
        assert_eq!(
            Float::from_f16(half::f16::from_f64(1.5)).width(),
            FloatWidth::F16
        );
        assert_eq!(Float::from_f16(half::f16::from_f64(1.5)).value(), 1.5);
    }

    #[test]
    fn key_strings_are_compact() {
        assert_eq!(Value::Uint(7).key_string(), "7");
        assert_eq!(Value::Text("id".into()).key_string(), "\"id\"");
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).key_string(), "h'dead'");
    }
}
