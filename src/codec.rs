//! The [`Encode`]/[`Decode`] trait pair and implementations for the
//! standard types, plus the default-profile convenience entry points.
//!
//! Null/undefined decodes to the type's natural empty value for leaf
//! types (`0`, `false`, `""`, empty collections, `None`); types without a
//! natural empty value reject it with a type-mismatch error.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use time::OffsetDateTime;

use crate::bigint::BigInt;
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::profile::{DecodeProfile, DupKeyMode, EncodeProfile};
use crate::value::{Float, Value};
use crate::Error;

/// Serialize a value into a CBOR stream.
pub trait Encode {
    /// Write `self` as exactly one CBOR item.
    ///
    /// # Errors
    ///
    /// Returns profile-policy or container-accounting errors.
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error>;

    /// Whether an `omitempty` struct field holding this value is dropped.
    ///
    /// The default is `false`: types without a natural empty value (time,
    /// bignums, structs) are never omitted.
    fn is_empty_value(&self) -> bool {
        false
    }
}

/// Deserialize a value from a CBOR stream.
pub trait Decode: Sized {
    /// Read exactly one CBOR item into a new value.
    ///
    /// # Errors
    ///
    /// Returns type-mismatch, overflow or policy errors.
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error>;
}

/// Encode with the default profile (no sorting, shortest-form preferences
/// off, tags and indefinite lengths allowed).
///
/// # Errors
///
/// Returns any error from the value's [`Encode`] impl.
pub fn to_vec<T: Encode + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
    EncodeProfile::default().to_vec(value)
}

/// Decode with the default profile.
///
/// # Errors
///
/// Returns structural or conversion errors; see
/// [`DecodeProfile::from_slice`].
pub fn from_slice<T: Decode>(data: &[u8]) -> Result<T, Error> {
    DecodeProfile::default().from_slice(data)
}

/// Consume a pending null/undefined, reporting whether one was present.
fn take_nil(d: &mut Decoder<'_, '_>) -> Result<bool, Error> {
    if d.peek_nil()? {
        d.parse_null()?;
        Ok(true)
    } else {
        Ok(false)
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        (**self).encode(enc)
    }

    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl Encode for bool {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.bool(*self)
    }

    fn is_empty_value(&self) -> bool {
        !*self
    }
}

impl Decode for bool {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(false);
        }
        d.parse_bool()
    }
}

impl Encode for () {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.null()
    }

    fn is_empty_value(&self) -> bool {
        true
    }
}

impl Decode for () {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        d.parse_null()
    }
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
                    enc.uint(u64::from(*self))
                }

                fn is_empty_value(&self) -> bool {
                    *self == 0
                }
            }

            impl Decode for $ty {
                fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
                    if take_nil(d)? {
                        return Ok(0);
                    }
                    let v = d.parse_u64_as(stringify!($ty))?;
                    Self::try_from(v)
                        .map_err(|_| Error::unmarshal("positive integer", stringify!($ty)))
                }
            }
        )*
    };
}

impl_unsigned!(u8, u16, u32);

impl Encode for u64 {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.uint(*self)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0
    }
}

impl Decode for u64 {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(0);
        }
        d.parse_u64()
    }
}

impl Encode for usize {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.uint(*self as u64)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0
    }
}

impl Decode for usize {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(0);
        }
        let v = d.parse_u64_as("usize")?;
        Self::try_from(v).map_err(|_| Error::unmarshal("positive integer", "usize"))
    }
}

macro_rules! impl_signed {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
                    enc.int(i64::from(*self))
                }

                fn is_empty_value(&self) -> bool {
                    *self == 0
                }
            }

            impl Decode for $ty {
                fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
                    if take_nil(d)? {
                        return Ok(0);
                    }
                    let v = d.parse_i64_as(stringify!($ty))?;
                    Self::try_from(v).map_err(|_| Error::unmarshal("integer", stringify!($ty)))
                }
            }
        )*
    };
}

impl_signed!(i8, i16, i32);

impl Encode for i64 {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.int(*self)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0
    }
}

impl Decode for i64 {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(0);
        }
        d.parse_i64()
    }
}

impl Encode for isize {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.int(*self as i64)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0
    }
}

impl Decode for isize {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(0);
        }
        let v = d.parse_i64_as("isize")?;
        Self::try_from(v).map_err(|_| Error::unmarshal("integer", "isize"))
    }
}

impl Encode for u128 {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.uint_u128(*self)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0
    }
}

impl Decode for u128 {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(0);
        }
        let big = d.parse_bigint()?;
        big.to_u128()
            .ok_or(Error::unmarshal("bignum", "u128"))
    }
}

impl Encode for i128 {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.int_i128(*self)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0
    }
}

impl Decode for i128 {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(0);
        }
        let big = d.parse_bigint()?;
        big.to_i128()
            .ok_or(Error::unmarshal("bignum", "i128"))
    }
}

impl Encode for f64 {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.f64(*self)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl Decode for f64 {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(0.0);
        }
        d.parse_f64()
    }
}

impl Encode for f32 {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.f32(*self)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl Decode for f32 {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(0.0);
        }
        let v = d.parse_f64_as("f32")?;
        #[allow(clippy::cast_possible_truncation)]
        let narrowed = v as f32;
        if narrowed.is_infinite() && !v.is_infinite() {
            return Err(Error::unmarshal("primitives", "f32"));
        }
        Ok(narrowed)
    }
}

impl Encode for Float {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.float(*self)
    }

    fn is_empty_value(&self) -> bool {
        self.value() == 0.0
    }
}

impl Decode for Float {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(Self::from_f64(0.0));
        }
        d.parse_float()
    }
}

impl Encode for str {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.text(self)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Encode for String {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.text(self)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Decode for String {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(Self::new());
        }
        d.parse_text()
    }
}

impl Encode for BigInt {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.bignum(self)
    }
}

impl Decode for BigInt {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(Self::from(0u64));
        }
        d.parse_bigint()
    }
}

impl Encode for OffsetDateTime {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.time(self)
    }
}

impl Decode for OffsetDateTime {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        crate::time::decode_time(d)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        match self {
            Some(v) => v.encode(enc),
            None => enc.null(),
        }
    }

    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(None);
        }
        T::decode(d).map(Some)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        (**self).encode(enc)
    }

    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        T::decode(d).map(Self::new)
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.array(self.len(), |enc| {
            for item in self {
                item.encode(enc)?;
            }
            Ok(())
        })
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        self.as_slice().encode(enc)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(Self::new());
        }
        match d.parse_array_header_as("Vec")? {
            Some(len) => {
                let mut out = Self::with_capacity(len.min(4096));
                for _ in 0..len {
                    out.push(T::decode(d)?);
                }
                Ok(out)
            }
            None => {
                let mut out = Self::new();
                while !d.at_array_end()? {
                    out.push(T::decode(d)?);
                }
                Ok(out)
            }
        }
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        self.as_slice().encode(enc)
    }

    fn is_empty_value(&self) -> bool {
        N == 0
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        let items: Vec<T> = Vec::decode(d)?;
        items
            .try_into()
            .map_err(|_| Error::unmarshal("array", std::any::type_name::<Self>()))
    }
}

impl<K: Encode, V: Encode, S> Encode for HashMap<K, V, S> {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.map(|m| {
            for (key, value) in self {
                m.entry(|e| key.encode(e), |e| value.encode(e))?;
            }
            Ok(())
        })
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Decode + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(Self::default());
        }
        let header = d.parse_map_header_as("HashMap")?;
        let enforced = d.profile().options().dup_map_key == DupKeyMode::Enforced;
        let mut out = Self::with_capacity_and_hasher(
            header.unwrap_or(0).min(4096),
            S::default(),
        );
        let mut index = 0usize;
        loop {
            match header {
                Some(len) if index == len => break,
                None if d.at_array_end()? => break,
                _ => {}
            }
            let key_start = d.position();
            let key = K::decode(d)?;
            let value = V::decode(d)?;
            if out.insert(key, value).is_some() && enforced {
                d.skip_map_rest(header, index + 1)?;
                return Err(Error::DupMapKey {
                    key: d.rerender_key(key_start),
                    index,
                });
            }
            index += 1;
        }
        Ok(out)
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.map(|m| {
            for (key, value) in self {
                m.entry(|e| key.encode(e), |e| value.encode(e))?;
            }
            Ok(())
        })
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Decode for BTreeMap<K, V>
where
    K: Decode + Ord,
    V: Decode,
{
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if take_nil(d)? {
            return Ok(Self::new());
        }
        let header = d.parse_map_header_as("BTreeMap")?;
        let enforced = d.profile().options().dup_map_key == DupKeyMode::Enforced;
        let mut out = Self::new();
        let mut index = 0usize;
        loop {
            match header {
                Some(len) if index == len => break,
                None if d.at_array_end()? => break,
                _ => {}
            }
            let key_start = d.position();
            let key = K::decode(d)?;
            let value = V::decode(d)?;
            if out.insert(key, value).is_some() && enforced {
                d.skip_map_rest(header, index + 1)?;
                return Err(Error::DupMapKey {
                    key: d.rerender_key(key_start),
                    index,
                });
            }
            index += 1;
        }
        Ok(out)
    }
}

impl Encode for Value {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        match self {
            Self::Uint(v) => enc.uint(*v),
            Self::Int(v) => enc.int(*v),
            Self::Bytes(v) => enc.bytes(v),
            Self::Text(v) => enc.text(v),
            Self::Array(items) => enc.array(items.len(), |enc| {
                for item in items {
                    item.encode(enc)?;
                }
                Ok(())
            }),
            Self::Map(entries) => enc.map(|m| {
                for (key, value) in entries {
                    m.entry(|e| key.encode(e), |e| value.encode(e))?;
                }
                Ok(())
            }),
            Self::Tag(num, content) => enc.tag(*num, |enc| content.encode(enc)),
            Self::Bool(v) => enc.bool(*v),
            Self::Float(v) => enc.float(*v),
            Self::BigInt(v) => enc.bignum(v),
            Self::Time(v) => enc.time(v),
            Self::Simple(v) => enc.simple(*v),
            Self::Null => enc.null(),
            Self::Undefined => enc.undefined(),
        }
    }

    fn is_empty_value(&self) -> bool {
        match self {
            Self::Uint(v) => *v == 0,
            Self::Int(v) => *v == 0,
            Self::Bytes(v) => v.is_empty(),
            Self::Text(v) => v.is_empty(),
            Self::Array(v) => v.is_empty(),
            Self::Map(v) => v.is_empty(),
            Self::Bool(v) => !*v,
            Self::Float(v) => v.value() == 0.0,
            Self::Null | Self::Undefined => true,
            Self::Tag(..) | Self::BigInt(_) | Self::Time(_) | Self::Simple(_) => false,
        }
    }
}

impl Decode for Value {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        d.value()
    }
}
