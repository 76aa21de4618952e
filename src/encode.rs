//! The streaming encoder.
//!
//! An [`Encoder`] borrows its (shared, immutable) profile and owns the
//! per-call mutable state: the output buffer and the open-container stack.
//! One encoder per concurrent stream.
//!
//! Definite-length maps are buffered entry-by-entry and spliced in the
//! profile's sort order, so deterministic output never depends on the
//! caller's insertion order. Indefinite-length items are a separate
//! explicit mode (`begin_*`/`end`) and are refused outright by profiles
//! that forbid them.

use std::any::TypeId;

use crate::bigint::BigInt;
use crate::float;
use crate::order;
use crate::profile::{BigIntMode, EncodeProfile, IndefiniteMode, TagsMode};
use crate::value::Float;
use crate::wire;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Bytes,
    Text,
    Other,
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    DefArray { remaining: usize },
    DefTag { remaining: usize },
    IndefArray,
    IndefMap { items: usize },
    IndefBytes,
    IndefText,
}

/// Streaming CBOR encoder writing into an owned buffer.
pub struct Encoder<'p> {
    profile: &'p EncodeProfile,
    buf: Vec<u8>,
    frames: Vec<Frame>,
    root_items: usize,
}

impl<'p> Encoder<'p> {
    pub(crate) fn new(profile: &'p EncodeProfile) -> Self {
        Self {
            profile,
            buf: Vec::new(),
            frames: Vec::new(),
            root_items: 0,
        }
    }

    /// The profile this encoder was created from.
    #[must_use]
    pub fn profile(&self) -> &'p EncodeProfile {
        self.profile
    }

    /// Bytes emitted so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Finish the stream and return the encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns `UnclosedIndefinite` if a `begin_*` call was not matched by
    /// [`Encoder::end`].
    pub fn finish(mut self) -> Result<Vec<u8>, Error> {
        self.settle_tags();
        if !self.frames.is_empty() {
            return Err(Error::UnclosedIndefinite);
        }
        Ok(self.buf)
    }

    fn settle_tags(&mut self) {
        while matches!(self.frames.last(), Some(Frame::DefTag { remaining: 0 })) {
            self.frames.pop();
        }
    }

    /// Account one item against the innermost open container.
    fn note_item(&mut self, kind: ItemKind) -> Result<(), Error> {
        self.settle_tags();
        match self.frames.last_mut() {
            None => {
                self.root_items += 1;
                Ok(())
            }
            Some(Frame::DefArray { remaining } | Frame::DefTag { remaining }) => {
                if *remaining == 0 {
                    return Err(Error::ArrayLenMismatch);
                }
                *remaining -= 1;
                Ok(())
            }
            Some(Frame::IndefArray) => Ok(()),
            Some(Frame::IndefMap { items }) => {
                *items += 1;
                Ok(())
            }
            Some(Frame::IndefBytes) => {
                if kind == ItemKind::Bytes {
                    Ok(())
                } else {
                    Err(Error::ChunkType)
                }
            }
            Some(Frame::IndefText) => {
                if kind == ItemKind::Text {
                    Ok(())
                } else {
                    Err(Error::ChunkType)
                }
            }
        }
    }

    fn tags_allowed(&self) -> Result<(), Error> {
        if self.profile.options().tags == TagsMode::Forbidden {
            return Err(Error::TagsForbidden);
        }
        Ok(())
    }

    fn indefinite_allowed(&self) -> Result<(), Error> {
        if self.profile.options().indefinite == IndefiniteMode::Forbidden {
            return Err(Error::IndefiniteLength);
        }
        Ok(())
    }

    /// Encode an unsigned integer with a minimal-width header.
    ///
    /// # Errors
    ///
    /// Returns container-accounting errors only.
    pub fn uint(&mut self, v: u64) -> Result<(), Error> {
        self.note_item(ItemKind::Other)?;
        wire::write_head(&mut self.buf, wire::MAJOR_UINT, v);
        Ok(())
    }

    /// Encode a signed integer with a minimal-width header.
    ///
    /// # Errors
    ///
    /// Returns container-accounting errors only.
    pub fn int(&mut self, v: i64) -> Result<(), Error> {
        if v >= 0 {
            return self.uint(v as u64);
        }
        self.note_item(ItemKind::Other)?;
        let n = (-1_i128 - i128::from(v)) as u64;
        wire::write_head(&mut self.buf, wire::MAJOR_NINT, n);
        Ok(())
    }

    /// Encode a signed 128-bit integer, widening to a bignum on overflow.
    ///
    /// # Errors
    ///
    /// Returns `TagsForbidden` when a bignum is needed under a
    /// tag-forbidding profile.
    pub fn int_i128(&mut self, v: i128) -> Result<(), Error> {
        if let Ok(small) = i64::try_from(v) {
            return self.int(small);
        }
        self.bignum(&BigInt::from(v))
    }

    /// Encode an unsigned 128-bit integer, widening to a bignum on
    /// overflow.
    ///
    /// # Errors
    ///
    /// Returns `TagsForbidden` when a bignum is needed under a
    /// tag-forbidding profile.
    pub fn uint_u128(&mut self, v: u128) -> Result<(), Error> {
        if let Ok(small) = u64::try_from(v) {
            return self.uint(small);
        }
        self.bignum(&BigInt::from(v))
    }

    /// Encode an arbitrary-precision integer under the profile's bignum
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns `TagsForbidden` when the tag form is required but tags are
    /// forbidden.
    pub fn bignum(&mut self, v: &BigInt) -> Result<(), Error> {
        if self.profile.options().bigint == BigIntMode::Shortest {
            if let Some(u) = v.to_u64() {
                return self.uint(u);
            }
            if let Some(n) = v.to_nint_arg() {
                self.note_item(ItemKind::Other)?;
                wire::write_head(&mut self.buf, wire::MAJOR_NINT, n);
                return Ok(());
            }
        }
        self.tags_allowed()?;
        let (negative, content) = v.wire_parts()?;
        self.note_item(ItemKind::Other)?;
        wire::write_head(&mut self.buf, wire::MAJOR_TAG, if negative { 3 } else { 2 });
        wire::write_head(&mut self.buf, wire::MAJOR_BYTES, content.len() as u64);
        self.buf.extend_from_slice(&content);
        Ok(())
    }

    /// Encode a byte string (or one chunk of an open byte-string stream).
    ///
    /// # Errors
    ///
    /// Returns `ChunkType` when a text-string stream is open.
    pub fn bytes(&mut self, v: &[u8]) -> Result<(), Error> {
        self.note_item(ItemKind::Bytes)?;
        wire::write_head(&mut self.buf, wire::MAJOR_BYTES, v.len() as u64);
        self.buf.extend_from_slice(v);
        Ok(())
    }

    /// Encode a text string (or one chunk of an open text-string stream).
    ///
    /// # Errors
    ///
    /// Returns `ChunkType` when a byte-string stream is open.
    pub fn text(&mut self, v: &str) -> Result<(), Error> {
        self.note_item(ItemKind::Text)?;
        wire::write_head(&mut self.buf, wire::MAJOR_TEXT, v.len() as u64);
        self.buf.extend_from_slice(v.as_bytes());
        Ok(())
    }

    /// Encode a boolean.
    ///
    /// # Errors
    ///
    /// Returns container-accounting errors only.
    pub fn bool(&mut self, v: bool) -> Result<(), Error> {
        self.note_item(ItemKind::Other)?;
        self.buf.push(if v { 0xf5 } else { 0xf4 });
        Ok(())
    }

    /// Encode null.
    ///
    /// # Errors
    ///
    /// Returns container-accounting errors only.
    pub fn null(&mut self) -> Result<(), Error> {
        self.note_item(ItemKind::Other)?;
        self.buf.push(0xf6);
        Ok(())
    }

    /// Encode undefined.
    ///
    /// # Errors
    ///
    /// Returns container-accounting errors only.
    pub fn undefined(&mut self) -> Result<(), Error> {
        self.note_item(ItemKind::Other)?;
        self.buf.push(0xf7);
        Ok(())
    }

    /// Encode an unassigned simple value.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for the reserved range 24..=31.
    pub fn simple(&mut self, v: u8) -> Result<(), Error> {
        if (24..32).contains(&v) {
            return Err(Error::UnsupportedType {
                type_name: "reserved simple value",
            });
        }
        self.note_item(ItemKind::Other)?;
        if v < 24 {
            self.buf.push(0xe0 | v);
        } else {
            self.buf.push(0xf8);
            self.buf.push(v);
        }
        Ok(())
    }

    /// Encode a float under the profile's width/NaN/Inf policies.
    ///
    /// # Errors
    ///
    /// Returns container-accounting errors only.
    pub fn float(&mut self, v: Float) -> Result<(), Error> {
        self.note_item(ItemKind::Other)?;
        float::encode_float(&mut self.buf, v, self.profile.options());
        Ok(())
    }

    /// Encode an `f64` under the profile's float policies.
    ///
    /// # Errors
    ///
    /// Returns container-accounting errors only.
    pub fn f64(&mut self, v: f64) -> Result<(), Error> {
        self.float(Float::from_f64(v))
    }

    /// Encode an `f32` under the profile's float policies.
    ///
    /// # Errors
    ///
    /// Returns container-accounting errors only.
    pub fn f32(&mut self, v: f32) -> Result<(), Error> {
        self.float(Float::from_f32(v))
    }

    /// Encode a date/time value under the profile's time policies.
    ///
    /// # Errors
    ///
    /// Returns `TagsForbidden` via profile validation paths, or a range
    /// error mapped to `UnsupportedType` for out-of-range timestamps.
    pub fn time(&mut self, v: &time::OffsetDateTime) -> Result<(), Error> {
        crate::time::encode_time(self, v)
    }

    /// Encode a tagged item: the tag header, then exactly one content item
    /// produced by `f`.
    ///
    /// # Errors
    ///
    /// Returns `TagsForbidden` under a tag-forbidding profile, or
    /// `ArrayLenMismatch` if `f` does not produce exactly one item.
    pub fn tag<F>(&mut self, num: u64, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Self) -> Result<(), Error>,
    {
        self.tags_allowed()?;
        self.note_item(ItemKind::Other)?;
        let start = self.buf.len();
        let frame_depth = self.frames.len();
        wire::write_head(&mut self.buf, wire::MAJOR_TAG, num);
        self.frames.push(Frame::DefTag { remaining: 1 });
        let result = f(self).and_then(|()| {
            self.settle_tags();
            if self.frames.len() == frame_depth {
                Ok(())
            } else {
                Err(Error::ArrayLenMismatch)
            }
        });
        if let Err(err) = result {
            self.buf.truncate(start);
            self.frames.truncate(frame_depth);
            return Err(err);
        }
        Ok(())
    }

    /// Encode a definite-length array of `len` items produced by `f`.
    ///
    /// # Errors
    ///
    /// Returns `ArrayLenMismatch` if `f` produces a different number of
    /// items, or any error from `f` itself.
    pub fn array<F>(&mut self, len: usize, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Self) -> Result<(), Error>,
    {
        self.note_item(ItemKind::Other)?;
        let start = self.buf.len();
        let frame_depth = self.frames.len();
        wire::write_head(&mut self.buf, wire::MAJOR_ARRAY, len as u64);
        self.frames.push(Frame::DefArray { remaining: len });
        let result = f(self).and_then(|()| {
            self.settle_tags();
            match self.frames.last() {
                Some(Frame::DefArray { remaining: 0 }) if self.frames.len() == frame_depth + 1 => {
                    Ok(())
                }
                _ => Err(Error::ArrayLenMismatch),
            }
        });
        if let Err(err) = result {
            self.buf.truncate(start);
            self.frames.truncate(frame_depth);
            return Err(err);
        }
        self.frames.truncate(frame_depth);
        Ok(())
    }

    /// Encode a definite-length map whose entries are collected by `f` and
    /// emitted in the profile's sort order.
    ///
    /// # Errors
    ///
    /// Returns any error from `f` or from entry encoding.
    pub fn map<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut MapBuilder<'p>) -> Result<(), Error>,
    {
        self.note_item(ItemKind::Other)?;
        let mut builder = MapBuilder {
            profile: self.profile,
            entries: Vec::new(),
        };
        f(&mut builder)?;
        self.splice_map(builder.entries);
        Ok(())
    }

    /// Write an already-encoded entry list as a map, sorted per profile.
    pub(crate) fn splice_map(&mut self, mut entries: Vec<(Vec<u8>, Vec<u8>)>) {
        order::sort_entries(self.profile.options().sort, &mut entries);
        wire::write_head(&mut self.buf, wire::MAJOR_MAP, entries.len() as u64);
        for (key, value) in entries {
            self.buf.extend_from_slice(&key);
            self.buf.extend_from_slice(&value);
        }
    }

    /// Begin an indefinite-length array. Items written next belong to it
    /// until [`Encoder::end`].
    ///
    /// # Errors
    ///
    /// Returns `IndefiniteLength` under a forbidding profile.
    pub fn begin_array(&mut self) -> Result<(), Error> {
        self.indefinite_allowed()?;
        self.note_item(ItemKind::Other)?;
        wire::write_indefinite_head(&mut self.buf, wire::MAJOR_ARRAY);
        self.frames.push(Frame::IndefArray);
        Ok(())
    }

    /// Begin an indefinite-length map. Keys and values alternate until
    /// [`Encoder::end`].
    ///
    /// # Errors
    ///
    /// Returns `IndefiniteLength` under a forbidding profile.
    pub fn begin_map(&mut self) -> Result<(), Error> {
        self.indefinite_allowed()?;
        self.note_item(ItemKind::Other)?;
        wire::write_indefinite_head(&mut self.buf, wire::MAJOR_MAP);
        self.frames.push(Frame::IndefMap { items: 0 });
        Ok(())
    }

    /// Begin an indefinite-length byte string; subsequent [`Encoder::bytes`]
    /// calls write chunks.
    ///
    /// # Errors
    ///
    /// Returns `IndefiniteLength` under a forbidding profile.
    pub fn begin_bytes(&mut self) -> Result<(), Error> {
        self.indefinite_allowed()?;
        self.note_item(ItemKind::Other)?;
        wire::write_indefinite_head(&mut self.buf, wire::MAJOR_BYTES);
        self.frames.push(Frame::IndefBytes);
        Ok(())
    }

    /// Begin an indefinite-length text string; subsequent [`Encoder::text`]
    /// calls write chunks.
    ///
    /// # Errors
    ///
    /// Returns `IndefiniteLength` under a forbidding profile.
    pub fn begin_text(&mut self) -> Result<(), Error> {
        self.indefinite_allowed()?;
        self.note_item(ItemKind::Other)?;
        wire::write_indefinite_head(&mut self.buf, wire::MAJOR_TEXT);
        self.frames.push(Frame::IndefText);
        Ok(())
    }

    /// Close the innermost indefinite-length item with a break marker.
    ///
    /// # Errors
    ///
    /// Returns `NotStreaming` when nothing is open, or `MapLenMismatch`
    /// when an indefinite map holds an odd number of items.
    pub fn end(&mut self) -> Result<(), Error> {
        self.settle_tags();
        match self.frames.last() {
            Some(Frame::IndefArray | Frame::IndefBytes | Frame::IndefText) => {
                self.frames.pop();
                self.buf.push(wire::BREAK);
                Ok(())
            }
            Some(Frame::IndefMap { items }) => {
                if items % 2 != 0 {
                    return Err(Error::MapLenMismatch);
                }
                self.frames.pop();
                self.buf.push(wire::BREAK);
                Ok(())
            }
            _ => Err(Error::NotStreaming),
        }
    }

    /// Splice pre-encoded bytes as the next item.
    ///
    /// The bytes must form exactly one well-formed item; the encoder
    /// passes them through untouched, which is the escape hatch used by
    /// [`crate::RawValue`].
    ///
    /// # Errors
    ///
    /// Returns container-accounting errors only.
    pub fn raw(&mut self, item: &[u8]) -> Result<(), Error> {
        self.note_item(ItemKind::Other)?;
        self.buf.extend_from_slice(item);
        Ok(())
    }

    /// Emit the registered tag chain for `type_id`, if any, ahead of the
    /// value the caller writes next.
    ///
    /// # Errors
    ///
    /// Returns `TagsForbidden` when a chain must be written under a
    /// tag-forbidding profile.
    pub fn write_registered_tags(&mut self, type_id: TypeId) -> Result<(), Error> {
        let Some(reg) = self.profile.registered_for_type(type_id) else {
            return Ok(());
        };
        if reg.opts.enc != crate::registry::EncTagMode::Required {
            return Ok(());
        }
        for num in reg.nums {
            self.tags_allowed()?;
            self.note_item(ItemKind::Other)?;
            wire::write_head(&mut self.buf, wire::MAJOR_TAG, num);
            self.frames.push(Frame::DefTag { remaining: 1 });
        }
        Ok(())
    }

    pub(crate) fn finish_item(self) -> Result<Vec<u8>, Error> {
        if self.root_items != 1 {
            return Err(Error::ArrayLenMismatch);
        }
        self.finish()
    }

    /// A fresh encoder over the same profile, for out-of-line entries.
    pub(crate) fn scratch(&self) -> Encoder<'p> {
        Encoder::new(self.profile)
    }

    /// Write pre-encoded entries as one map item, sorted per profile.
    pub(crate) fn splice_map_item(
        &mut self,
        entries: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<(), Error> {
        self.note_item(ItemKind::Other)?;
        self.splice_map(entries);
        Ok(())
    }
}

/// Collects one map's entries before sorted emission.
pub struct MapBuilder<'p> {
    profile: &'p EncodeProfile,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl<'p> MapBuilder<'p> {
    /// Add one entry; `key` and `value` each encode exactly one item.
    ///
    /// # Errors
    ///
    /// Returns any error from the closures, or `ArrayLenMismatch` when a
    /// closure emits a different number of items.
    pub fn entry<K, V>(&mut self, key: K, value: V) -> Result<(), Error>
    where
        K: FnOnce(&mut Encoder<'p>) -> Result<(), Error>,
        V: FnOnce(&mut Encoder<'p>) -> Result<(), Error>,
    {
        let mut key_enc = Encoder::new(self.profile);
        key(&mut key_enc)?;
        let key_bytes = key_enc.finish_item()?;
        let mut value_enc = Encoder::new(self.profile);
        value(&mut value_enc)?;
        let value_bytes = value_enc.finish_item()?;
        self.entries.push((key_bytes, value_bytes));
        Ok(())
    }

    /// Number of entries collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no entries were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
