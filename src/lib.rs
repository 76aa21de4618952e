//! # polycbor
//!
//! An RFC 8949 CBOR codec with selectable **deterministic encoding
//! profiles**: the same logical content always produces the same bytes
//! under a given profile, which is what signed payloads and protocol
//! handshakes need.
//!
//! ## Profiles
//!
//! All policy lives in [`EncodeProfile`] / [`DecodeProfile`], validated
//! once at construction and then immutable — safe to share across any
//! number of concurrent encode/decode calls. Four preset bundles cover the
//! common deterministic encodings:
//!
//! - [`EncodeOptions::canonical`] — RFC 7049 canonical form
//!   (length-first key order).
//! - [`EncodeOptions::ctap2`] — CTAP2 canonical form (bytewise key
//!   order, values passed through bit-exact).
//! - [`EncodeOptions::core_deterministic`] — RFC 8949 §4.2 core
//!   deterministic encoding.
//! - [`EncodeOptions::preferred_unsorted`] — preferred serialization
//!   without sorting.
//!
//! ## Typed and generic values
//!
//! Types implement [`Encode`]/[`Decode`] (usually via `#[derive]`), or use
//! the generic [`Value`] model when no native type fits. Struct fields
//! support the usual attribute mini-language (`rename`, `omitempty`,
//! `skip`, `keyasint`, `embed`, `toarray`); embedded fields are promoted
//! with document-style shadowing rules.
//!
//! ```
//! use polycbor::{DecodeProfile, Decode, Encode, EncodeOptions, EncodeProfile};
//!
//! #[derive(Debug, Default, PartialEq, Encode, Decode)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//!     #[cbor(rename = "label", omitempty)]
//!     name: String,
//! }
//!
//! let profile = EncodeProfile::new(EncodeOptions::core_deterministic())?;
//! let bytes = profile.to_vec(&Point { x: 1, y: -2, name: String::new() })?;
//! // "x" and "y" in bytewise order, empty label omitted
//! assert_eq!(bytes, [0xa2, 0x61, 0x78, 0x01, 0x61, 0x79, 0x21]);
//!
//! let back: Point = DecodeProfile::default().from_slice(&bytes)?;
//! assert_eq!(back, Point { x: 1, y: -2, name: String::new() });
//! # Ok::<(), polycbor::Error>(())
//! ```
//!
//! ## Resource bounds
//!
//! Decoding is two-phase: a structural well-formedness pass (nesting and
//! element-count limits included) runs over the whole input before any
//! value is materialized, so malformed documents are rejected wholesale
//! and adversarial nesting is bounded by configuration, not by stack
//! luck.
//!
//! ## Feature flags
//!
//! - `simdutf8`: SIMD-accelerated UTF-8 validation where supported.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod bigint;
mod codec;
mod decode;
mod encode;
mod error;
mod float;
mod macros;
mod order;
mod profile;
mod raw;
mod registry;
pub mod schema;
mod time;
pub(crate) mod utf8;
mod validate;
mod value;
mod wire;

pub use crate::bigint::BigInt;
pub use crate::codec::{from_slice, to_vec, Decode, Encode};
pub use crate::decode::Decoder;
pub use crate::encode::{Encoder, MapBuilder};
pub use crate::error::Error;
pub use crate::order::{cmp_bytewise_lexical, cmp_length_first};
pub use crate::profile::{
    BigIntMode, DecodeOptions, DecodeProfile, DupKeyMode, EncodeOptions, EncodeProfile, FloatMode,
    IndefiniteMode, InfMode, IntDecMode, MapKeyBytesMode, NanMode, SortMode, TagsMode, TimeMode,
    TimeTagMode, UnknownFieldMode, DEFAULT_MAX_ARRAY_ELEMENTS, DEFAULT_MAX_MAP_PAIRS,
    DEFAULT_MAX_NESTING,
};
pub use crate::raw::{ByteString, RawTag, RawValue};
pub use crate::registry::{DecTagMode, EncTagMode, SharedTagSet, TagItem, TagOptions, TagSet};
pub use crate::value::{Float, FloatWidth, Value};

pub use polycbor_derive::{Decode, Encode};
