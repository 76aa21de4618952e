//! Byte-exact passthrough containers.
//!
//! [`RawValue`] defers encoding or decoding of one item: it splices its
//! bytes verbatim on encode and captures the exact span of the next item
//! on decode, which is also the hook for hand-written impls that parse
//! foreign formats themselves. [`RawTag`] does the same for a tagged item
//! whose number has no registration. [`ByteString`] is the immutable,
//! hashable wrapper that lets byte-string keys live in ordinary map
//! targets.

use crate::codec::{Decode, Encode};
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::wire;
use crate::Error;

/// An immutable byte-string wrapper usable as a map key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteString(Vec<u8>);

impl ByteString {
    /// Wrap owned bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The wrapped bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Unwrap into the owned bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for ByteString {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for ByteString {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Encode for ByteString {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.bytes(&self.0)
    }

    fn is_empty_value(&self) -> bool {
        self.0.is_empty()
    }
}

impl Decode for ByteString {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if d.peek_nil()? {
            d.parse_null()?;
            return Ok(Self::default());
        }
        d.parse_bytes().map(Self)
    }
}

/// One pre-encoded (or to-be-decoded-later) CBOR item, verbatim.
///
/// An empty `RawValue` encodes as null. On encode the bytes are spliced
/// untouched; the caller guarantees they hold exactly one well-formed
/// item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawValue(pub Vec<u8>);

impl RawValue {
    /// The raw item bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Encode for RawValue {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        if self.0.is_empty() {
            return enc.null();
        }
        enc.raw(&self.0)
    }

    fn is_empty_value(&self) -> bool {
        self.0.is_empty()
    }
}

impl Decode for RawValue {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        d.raw_item().map(|span| Self(span.to_vec()))
    }
}

/// An unregistered tag kept as its number plus raw content bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTag {
    /// The tag number.
    pub number: u64,
    /// The raw content item.
    pub content: RawValue,
}

impl Encode for RawTag {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.tag(self.number, |enc| {
            if self.content.0.is_empty() {
                enc.null()
            } else {
                enc.raw(&self.content.0)
            }
        })
    }
}

impl Decode for RawTag {
    fn decode(d: &mut Decoder<'_, '_>) -> Result<Self, Error> {
        if d.peek_major()? != wire::MAJOR_TAG {
            let major = d.peek_major()?;
            return Err(Error::unmarshal(wire::major_type_name(major), "RawTag"));
        }
        let (_, ai, off) = d.read_head_raw()?;
        let number = d.arg(ai, off)?;
        let content = d.raw_item()?.to_vec();
        Ok(Self {
            number,
            content: RawValue(content),
        })
    }
}
