//! Encoding and decoding profiles.
//!
//! A profile is the validated, immutable form of an options struct. All
//! policy decisions are made here, once, at construction; encode and decode
//! calls only read the result. Profiles are `Sync` and meant to be built
//! once and shared across every call site that needs the same behavior.
//!
//! Four deterministic presets are provided:
//!
//! | preset | sort | floats | NaN | Inf | indefinite |
//! |---|---|---|---|---|---|
//! | [`EncodeOptions::canonical`] | length-first | shortest | canonical | float16 | forbidden |
//! | [`EncodeOptions::ctap2`] | bytewise | as-is | as-is | as-is | forbidden |
//! | [`EncodeOptions::core_deterministic`] | bytewise | shortest | canonical | float16 | forbidden |
//! | [`EncodeOptions::preferred_unsorted`] | insertion | shortest | canonical | float16 | allowed |

use std::any::TypeId;
use std::io::{Read, Write};

use crate::codec::{Decode, Encode};
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::registry::{RegisteredTags, SharedTagSet, TagSet, TagSource};
use crate::validate;
use crate::value::Value;
use crate::Error;

/// Map/struct key ordering applied at emission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Keep insertion order.
    #[default]
    None,
    /// Shorter encoded key first, ties bytewise (RFC 7049 canonical).
    LengthFirst,
    /// Pure bytewise-lexical order of encoded keys (RFC 8949 §4.2.1).
    BytewiseLexical,
}

/// Floating-point width selection for finite values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatMode {
    /// Keep the value's original width.
    #[default]
    None,
    /// Use the narrowest of float16/float32/float64 that round-trips
    /// bit-exactly.
    Shortest,
}

/// NaN emission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NanMode {
    /// Always emit the canonical quiet NaN `f9 7e00`.
    #[default]
    Canonical,
    /// Keep the exact bit pattern at the original width.
    Preserve,
    /// Keep the bit pattern (including the signaling bit) and shrink to
    /// float16/float32 when the dropped mantissa bits are zero.
    PreserveSignal,
    /// Force the quiet bit, then shrink when the dropped mantissa bits are
    /// zero.
    Quiet,
}

/// Infinity emission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfMode {
    /// Always emit the float16 infinities `f9 7c00` / `f9 fc00`.
    #[default]
    Float16,
    /// Keep the original width.
    Preserve,
}

/// Bignum emission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BigIntMode {
    /// Emit a native major-type integer when the magnitude fits, falling
    /// back to tags 2/3 only on overflow.
    #[default]
    Shortest,
    /// Always emit tags 2/3 with a minimal big-endian magnitude.
    Tagged,
}

/// Date/time content encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeMode {
    /// Integer Unix seconds (sub-second part truncated).
    #[default]
    Unix,
    /// Float Unix seconds at microsecond granularity.
    UnixMicro,
    /// Integer seconds when there is no fractional part, float otherwise.
    UnixDynamic,
    /// RFC 3339 text without fractional seconds.
    Rfc3339,
    /// RFC 3339 text with nanosecond fractional seconds.
    Rfc3339Nano,
}

/// Whether date/time values carry their standard tag (0 text / 1 numeric).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeTagMode {
    /// Emit bare content without a tag.
    #[default]
    Omitted,
    /// Wrap the content in tag 0 (text modes) or tag 1 (numeric modes).
    Required,
}

/// Indefinite-length policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndefiniteMode {
    /// Indefinite-length items may be produced and accepted.
    #[default]
    Allowed,
    /// Starting or decoding an indefinite-length item is an error.
    Forbidden,
}

/// Tag policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagsMode {
    /// Tags may be produced and accepted.
    #[default]
    Allowed,
    /// Any tagged item is an error.
    Forbidden,
}

/// Duplicate map key policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DupKeyMode {
    /// Accept duplicates quietly; for struct targets the first occurrence
    /// wins, later ones are skipped as unknown keys.
    #[default]
    Quiet,
    /// Reject any repeated key with [`Error::DupMapKey`] and stop
    /// processing the map.
    Enforced,
}

/// How major-type-0 integers decode into a generic [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntDecMode {
    /// Decode to [`Value::Uint`].
    #[default]
    Unsigned,
    /// Decode to [`Value::Int`], erroring when the value overflows `i64`.
    Signed,
}

/// How byte-string map keys decode in generic maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapKeyBytesMode {
    /// Reject byte-string keys with [`Error::InvalidMapKeyType`].
    #[default]
    Fail,
    /// Accept them (typed targets use the [`crate::ByteString`] wrapper).
    Wrap,
}

/// Unknown struct field policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFieldMode {
    /// Skip unmatched map keys.
    #[default]
    Ignore,
    /// Reject them with [`Error::UnknownField`].
    Error,
}

/// Default maximum nesting depth.
pub const DEFAULT_MAX_NESTING: usize = 32;
/// Default maximum array element count.
pub const DEFAULT_MAX_ARRAY_ELEMENTS: usize = 131_072;
/// Default maximum map pair count.
pub const DEFAULT_MAX_MAP_PAIRS: usize = 131_072;

const MAX_NESTING_RANGE: (usize, usize) = (4, 256);
const MAX_CONTAINER_RANGE: (usize, usize) = (16, 2_147_483_647);

/// Options controlling the encoder. Construct with struct-update syntax
/// from a preset or from `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOptions {
    /// Map/struct key ordering.
    pub sort: SortMode,
    /// Finite float width selection.
    pub float: FloatMode,
    /// NaN emission policy.
    pub nan: NanMode,
    /// Infinity emission policy.
    pub inf: InfMode,
    /// Bignum emission policy.
    pub bigint: BigIntMode,
    /// Date/time content encoding.
    pub time: TimeMode,
    /// Date/time tag emission.
    pub time_tag: TimeTagMode,
    /// Indefinite-length policy.
    pub indefinite: IndefiniteMode,
    /// Tag policy.
    pub tags: TagsMode,
}

impl EncodeOptions {
    /// RFC 7049 canonical encoding: length-first sort, shortest floats,
    /// canonical NaN, float16 infinities, no indefinite lengths.
    #[must_use]
    pub fn canonical() -> Self {
        Self {
            sort: SortMode::LengthFirst,
            float: FloatMode::Shortest,
            nan: NanMode::Canonical,
            inf: InfMode::Float16,
            indefinite: IndefiniteMode::Forbidden,
            ..Self::default()
        }
    }

    /// CTAP2 canonical encoding: bytewise sort, widths and special values
    /// passed through untouched, no indefinite lengths, no tags.
    #[must_use]
    pub fn ctap2() -> Self {
        Self {
            sort: SortMode::BytewiseLexical,
            float: FloatMode::None,
            nan: NanMode::Preserve,
            inf: InfMode::Preserve,
            indefinite: IndefiniteMode::Forbidden,
            tags: TagsMode::Forbidden,
            ..Self::default()
        }
    }

    /// RFC 8949 core deterministic encoding: bytewise sort, shortest
    /// floats, canonical NaN, float16 infinities, no indefinite lengths.
    #[must_use]
    pub fn core_deterministic() -> Self {
        Self {
            sort: SortMode::BytewiseLexical,
            float: FloatMode::Shortest,
            nan: NanMode::Canonical,
            inf: InfMode::Float16,
            indefinite: IndefiniteMode::Forbidden,
            ..Self::default()
        }
    }

    /// Preferred serialization without sorting: shortest floats, canonical
    /// NaN, float16 infinities, indefinite lengths allowed.
    #[must_use]
    pub fn preferred_unsorted() -> Self {
        Self {
            sort: SortMode::None,
            float: FloatMode::Shortest,
            nan: NanMode::Canonical,
            inf: InfMode::Float16,
            indefinite: IndefiniteMode::Allowed,
            ..Self::default()
        }
    }
}

/// Options controlling the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Duplicate map key policy.
    pub dup_map_key: DupKeyMode,
    /// Maximum nesting depth across arrays, maps and tags.
    pub max_nesting: usize,
    /// Maximum declared array element count.
    pub max_array_elements: usize,
    /// Maximum declared map pair count.
    pub max_map_pairs: usize,
    /// Tag policy.
    pub tags: TagsMode,
    /// Generic integer decoding policy.
    pub int_dec: IntDecMode,
    /// Byte-string map key policy.
    pub map_key_bytes: MapKeyBytesMode,
    /// Unknown struct field policy.
    pub unknown_fields: UnknownFieldMode,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            dup_map_key: DupKeyMode::default(),
            max_nesting: DEFAULT_MAX_NESTING,
            max_array_elements: DEFAULT_MAX_ARRAY_ELEMENTS,
            max_map_pairs: DEFAULT_MAX_MAP_PAIRS,
            tags: TagsMode::default(),
            int_dec: IntDecMode::default(),
            map_key_bytes: MapKeyBytesMode::default(),
            unknown_fields: UnknownFieldMode::default(),
        }
    }
}

/// A validated, immutable encoding configuration.
#[derive(Debug, Clone, Default)]
pub struct EncodeProfile {
    opts: EncodeOptions,
    tags: TagSource,
}

impl EncodeProfile {
    /// Validate `opts` into a profile.
    ///
    /// # Errors
    ///
    /// Returns `Config` when the option combination is contradictory
    /// (currently: requiring time tags while forbidding tags).
    pub fn new(opts: EncodeOptions) -> Result<Self, Error> {
        Self::check(&opts)?;
        Ok(Self {
            opts,
            tags: TagSource::None,
        })
    }

    /// Validate `opts` into a profile that consults a frozen tag set.
    ///
    /// # Errors
    ///
    /// Same rules as [`EncodeProfile::new`].
    pub fn with_tags(opts: EncodeOptions, tags: TagSet) -> Result<Self, Error> {
        Self::check(&opts)?;
        Ok(Self {
            opts,
            tags: TagSource::Frozen(tags.into()),
        })
    }

    /// Validate `opts` into a profile that consults a shared tag set.
    ///
    /// # Errors
    ///
    /// Same rules as [`EncodeProfile::new`].
    pub fn with_shared_tags(opts: EncodeOptions, tags: SharedTagSet) -> Result<Self, Error> {
        Self::check(&opts)?;
        Ok(Self {
            opts,
            tags: TagSource::Shared(tags),
        })
    }

    fn check(opts: &EncodeOptions) -> Result<(), Error> {
        if opts.time_tag == TimeTagMode::Required && opts.tags == TagsMode::Forbidden {
            return Err(Error::Config(
                "TimeTagMode::Required cannot be combined with TagsMode::Forbidden".to_owned(),
            ));
        }
        Ok(())
    }

    /// The options this profile was built from.
    #[must_use]
    pub const fn options(&self) -> &EncodeOptions {
        &self.opts
    }

    /// Encode one value to a fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns any error produced by the value's [`Encode`] impl.
    pub fn to_vec<T: Encode + ?Sized>(&self, value: &T) -> Result<Vec<u8>, Error> {
        let mut enc = Encoder::new(self);
        value.encode(&mut enc)?;
        enc.finish()
    }

    /// Encode one value and write the bytes to `writer`.
    ///
    /// # Errors
    ///
    /// Returns encoding errors, or `Io` when the write fails.
    pub fn to_writer<W: Write, T: Encode + ?Sized>(
        &self,
        writer: &mut W,
        value: &T,
    ) -> Result<(), Error> {
        let bytes = self.to_vec(value)?;
        writer
            .write_all(&bytes)
            .map_err(|e| Error::Io(e.to_string()))
    }

    /// A streaming encoder borrowing this profile.
    ///
    /// One encoder per concurrent stream: the handle owns mutable cursor
    /// state, the profile behind it is freely shared.
    #[must_use]
    pub fn encoder(&self) -> Encoder<'_> {
        Encoder::new(self)
    }

    pub(crate) fn registered_for_type(&self, type_id: TypeId) -> Option<RegisteredTags> {
        self.tags.for_type(type_id)
    }
}

/// A validated, immutable decoding configuration.
#[derive(Debug, Clone)]
pub struct DecodeProfile {
    opts: DecodeOptions,
    tags: TagSource,
}

impl Default for DecodeProfile {
    fn default() -> Self {
        Self {
            opts: DecodeOptions::default(),
            tags: TagSource::None,
        }
    }
}

impl DecodeProfile {
    /// Validate `opts` into a profile.
    ///
    /// # Errors
    ///
    /// Returns `Config` when a limit is outside its accepted range
    /// (`max_nesting` ∈ [4, 256], container limits ∈ [16, 2^31 - 1]).
    pub fn new(opts: DecodeOptions) -> Result<Self, Error> {
        Self::check(&opts)?;
        Ok(Self {
            opts,
            tags: TagSource::None,
        })
    }

    /// Validate `opts` into a profile that consults a frozen tag set.
    ///
    /// # Errors
    ///
    /// Same rules as [`DecodeProfile::new`].
    pub fn with_tags(opts: DecodeOptions, tags: TagSet) -> Result<Self, Error> {
        Self::check(&opts)?;
        Ok(Self {
            opts,
            tags: TagSource::Frozen(tags.into()),
        })
    }

    /// Validate `opts` into a profile that consults a shared tag set.
    ///
    /// # Errors
    ///
    /// Same rules as [`DecodeProfile::new`].
    pub fn with_shared_tags(opts: DecodeOptions, tags: SharedTagSet) -> Result<Self, Error> {
        Self::check(&opts)?;
        Ok(Self {
            opts,
            tags: TagSource::Shared(tags),
        })
    }

    fn check(opts: &DecodeOptions) -> Result<(), Error> {
        let (lo, hi) = MAX_NESTING_RANGE;
        if opts.max_nesting < lo || opts.max_nesting > hi {
            return Err(Error::Config(format!(
                "max_nesting {} outside [{lo}, {hi}]",
                opts.max_nesting
            )));
        }
        let (lo, hi) = MAX_CONTAINER_RANGE;
        if opts.max_array_elements < lo || opts.max_array_elements > hi {
            return Err(Error::Config(format!(
                "max_array_elements {} outside [{lo}, {hi}]",
                opts.max_array_elements
            )));
        }
        if opts.max_map_pairs < lo || opts.max_map_pairs > hi {
            return Err(Error::Config(format!(
                "max_map_pairs {} outside [{lo}, {hi}]",
                opts.max_map_pairs
            )));
        }
        Ok(())
    }

    /// The options this profile was built from.
    #[must_use]
    pub const fn options(&self) -> &DecodeOptions {
        &self.opts
    }

    /// Check well-formedness without materializing anything.
    ///
    /// # Errors
    ///
    /// Returns the structural error closest to the start of the input.
    pub fn valid(&self, data: &[u8]) -> Result<(), Error> {
        validate::well_formed(data, &self.opts)
    }

    /// Decode exactly one item from `data` into `T`.
    ///
    /// The input is validated wholesale before any decoding starts; a
    /// malformed document never yields a partially decoded value.
    ///
    /// # Errors
    ///
    /// Returns structural errors from validation, `TrailingBytes` when more
    /// than one item is present, or any error from `T`'s [`Decode`] impl.
    pub fn from_slice<T: Decode>(&self, data: &[u8]) -> Result<T, Error> {
        validate::well_formed(data, &self.opts)?;
        let mut dec = Decoder::new(data, self);
        let value = T::decode(&mut dec)?;
        if dec.position() != data.len() {
            return Err(Error::TrailingBytes {
                offset: dec.position(),
            });
        }
        Ok(value)
    }

    /// Decode one item into the generic [`Value`] model.
    ///
    /// # Errors
    ///
    /// Same rules as [`DecodeProfile::from_slice`].
    pub fn decode_value(&self, data: &[u8]) -> Result<Value, Error> {
        self.from_slice(data)
    }

    /// Read `reader` to its end and decode one item from the bytes.
    ///
    /// # Errors
    ///
    /// Returns `Io` when reading fails, otherwise the rules of
    /// [`DecodeProfile::from_slice`].
    pub fn from_reader<R: Read, T: Decode>(&self, reader: &mut R) -> Result<T, Error> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| Error::Io(e.to_string()))?;
        self.from_slice(&buf)
    }

    /// A validated streaming decoder over `data`.
    ///
    /// Unlike [`DecodeProfile::from_slice`] this accepts a CBOR sequence:
    /// the caller pulls items until [`Decoder::is_at_end`].
    ///
    /// # Errors
    ///
    /// Returns structural errors found during upfront validation.
    pub fn decoder<'de>(&self, data: &'de [u8]) -> Result<Decoder<'de, '_>, Error> {
        let mut pos = 0;
        while pos < data.len() {
            pos = validate::well_formed_prefix(data, pos, &self.opts)?;
        }
        Ok(Decoder::new(data, self))
    }

    pub(crate) fn registered_for_type(&self, type_id: TypeId) -> Option<RegisteredTags> {
        self.tags.for_type(type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_validate() {
        assert!(EncodeProfile::new(EncodeOptions::default()).is_ok());
        assert!(DecodeProfile::new(DecodeOptions::default()).is_ok());
    }

    #[test]
    fn time_tag_conflicts_with_forbidden_tags() {
        let opts = EncodeOptions {
            time_tag: TimeTagMode::Required,
            tags: TagsMode::Forbidden,
            ..EncodeOptions::default()
        };
        assert!(matches!(
            EncodeProfile::new(opts),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn limits_are_range_checked() {
        for (nesting, arrays) in [(3, DEFAULT_MAX_ARRAY_ELEMENTS), (257, 64), (32, 15)] {
            let opts = DecodeOptions {
                max_nesting: nesting,
                max_array_elements: arrays,
                ..DecodeOptions::default()
            };
            assert!(matches!(DecodeProfile::new(opts), Err(Error::Config(_))));
        }
    }
}
