//! Error taxonomy shared by profile construction, encoding and decoding.
//!
//! Every failure is an ordinary [`Error`] value; nothing in this crate
//! panics on malformed input. Decode-side variants carry the byte offset at
//! which the problem was detected, type-mismatch variants carry both the
//! CBOR type name and the native type name.

use thiserror::Error;

/// The error type for every fallible operation in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// A profile option combination was rejected at construction time.
    #[error("invalid profile configuration: {0}")]
    Config(String),

    /// The value has no CBOR representation under the active profile.
    #[error("cannot encode {type_name}: no CBOR representation")]
    UnsupportedType {
        /// Name of the offending native type.
        type_name: &'static str,
    },

    /// An indefinite-length item was started under a forbidding profile.
    #[error("indefinite-length items are forbidden by this profile")]
    IndefiniteLength,

    /// A tagged item was encoded or decoded under a tag-forbidding profile.
    #[error("tags are forbidden by this profile")]
    TagsForbidden,

    /// Input ended in the middle of an item.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof {
        /// Byte offset of the truncation point.
        offset: usize,
    },

    /// A header used a reserved additional-information value (28..=30).
    #[error("reserved additional-information value {ai} at offset {offset}")]
    ReservedAdditionalInfo {
        /// The reserved additional-information value.
        ai: u8,
        /// Byte offset of the header.
        offset: usize,
    },

    /// A break marker (`0xff`) appeared outside an indefinite-length item.
    #[error("unexpected break marker at offset {offset}")]
    UnexpectedBreak {
        /// Byte offset of the break marker.
        offset: usize,
    },

    /// An indefinite-length string contained a chunk of the wrong type or
    /// an indefinite-length chunk.
    #[error("invalid indefinite-length string chunk at offset {offset}")]
    InvalidChunk {
        /// Byte offset of the offending chunk header.
        offset: usize,
    },

    /// Nesting exceeded the profile's `max_nesting` limit.
    #[error("nesting depth exceeds {max} at offset {offset}")]
    DepthLimit {
        /// The configured limit.
        max: usize,
        /// Byte offset of the item that exceeded it.
        offset: usize,
    },

    /// An array header declared more elements than the profile allows.
    #[error("array of {len} elements exceeds limit {max} at offset {offset}")]
    ArrayLimit {
        /// Declared element count.
        len: usize,
        /// The configured limit.
        max: usize,
        /// Byte offset of the array header.
        offset: usize,
    },

    /// A map header declared more pairs than the profile allows.
    #[error("map of {len} pairs exceeds limit {max} at offset {offset}")]
    MapLimit {
        /// Declared pair count.
        len: usize,
        /// The configured limit.
        max: usize,
        /// Byte offset of the map header.
        offset: usize,
    },

    /// A length computation overflowed the platform word size.
    #[error("length overflow at offset {offset}")]
    LengthOverflow {
        /// Byte offset of the header carrying the length.
        offset: usize,
    },

    /// Bytes remained after the single top-level item.
    #[error("trailing bytes after top-level item at offset {offset}")]
    TrailingBytes {
        /// Byte offset of the first trailing byte.
        offset: usize,
    },

    /// A text string was not valid UTF-8.
    #[error("text string is not valid UTF-8 at offset {offset}")]
    Semantic {
        /// Byte offset of the string payload.
        offset: usize,
    },

    /// The CBOR item cannot be decoded into the requested native type.
    #[error("cannot decode CBOR {cbor_type} into {rust_type}{}", field_suffix(.field))]
    UnmarshalType {
        /// CBOR type name of the input item.
        cbor_type: &'static str,
        /// Name of the requested native type.
        rust_type: &'static str,
        /// Struct field path, when the mismatch occurred inside a struct.
        field: Option<String>,
    },

    /// A map key type is not usable for the requested target.
    #[error("invalid map key type: CBOR {cbor_type}")]
    InvalidMapKeyType {
        /// CBOR type name of the key.
        cbor_type: &'static str,
    },

    /// A map contained the same key twice (enforcing profiles only).
    #[error("duplicate map key {key} at element index {index}")]
    DupMapKey {
        /// Display rendering of the repeated key.
        key: String,
        /// Zero-based element index of the second occurrence.
        index: usize,
    },

    /// A map key matched no struct field (strict profiles only).
    #[error("unknown field at element index {index}")]
    UnknownField {
        /// Zero-based element index of the unknown key.
        index: usize,
    },

    /// The input's tag chain did not match a required registration.
    #[error("wrong tag chain {found:?} for {rust_type}, expected {expected:?}")]
    WrongTag {
        /// The registered tag-number chain, outermost first.
        expected: Vec<u64>,
        /// The chain found in the input (empty when the tag was absent).
        found: Vec<u64>,
        /// Name of the registered native type.
        rust_type: &'static str,
    },

    /// A definite-length array builder emitted the wrong number of items.
    #[error("array builder emitted a different number of items than declared")]
    ArrayLenMismatch,

    /// An indefinite-length map stream ended with an odd number of items.
    #[error("map stream contains an odd number of items")]
    MapLenMismatch,

    /// `finish` was called while an indefinite-length item was still open.
    #[error("unclosed indefinite-length item")]
    UnclosedIndefinite,

    /// `end` was called with no indefinite-length item open.
    #[error("no indefinite-length item is open")]
    NotStreaming,

    /// A chunk written into an indefinite-length string stream had the
    /// wrong item type.
    #[error("indefinite-length string chunks must match the container type")]
    ChunkType,

    /// An underlying I/O operation failed.
    #[error("i/o error: {0}")]
    Io(String),
}

impl Error {
    /// Attach a struct field path to a type-mismatch error.
    ///
    /// The first path wins: nested struct decoding attaches the innermost
    /// field name and outer layers leave it untouched.
    #[must_use]
    pub(crate) fn with_field(self, path: &str) -> Self {
        match self {
            Self::UnmarshalType {
                cbor_type,
                rust_type,
                field: None,
            } => Self::UnmarshalType {
                cbor_type,
                rust_type,
                field: Some(path.to_owned()),
            },
            other => other,
        }
    }

    /// Shorthand for a type-mismatch error without a field path.
    pub(crate) fn unmarshal(cbor_type: &'static str, rust_type: &'static str) -> Self {
        Self::UnmarshalType {
            cbor_type,
            rust_type,
            field: None,
        }
    }
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(f) => format!(" (struct field {f})"),
        None => String::new(),
    }
}
