//! The cursor decoder.
//!
//! A [`Decoder`] walks input that the well-formedness pass has already
//! accepted, so structural reads here trust headers and chunk framing and
//! concentrate on semantics: policy enforcement, tag interpretation and
//! native-type conversion. Recursion depth is bounded by the validated
//! nesting limit.

use std::any::TypeId;

use crate::bigint::BigInt;
use crate::profile::{DecodeProfile, DupKeyMode, IntDecMode, MapKeyBytesMode};
use crate::registry::DecTagMode;
use crate::value::{Float, FloatWidth, Value};
use crate::wire;
use crate::Error;

/// Streaming decoder over a validated byte slice.
pub struct Decoder<'de, 'p> {
    data: &'de [u8],
    pos: usize,
    profile: &'p DecodeProfile,
}

impl<'de, 'p> Decoder<'de, 'p> {
    pub(crate) fn new(data: &'de [u8], profile: &'p DecodeProfile) -> Self {
        Self {
            data,
            pos: 0,
            profile,
        }
    }

    /// The profile this decoder was created from.
    #[must_use]
    pub fn profile(&self) -> &'p DecodeProfile {
        self.profile
    }

    /// Current byte offset into the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns `true` when the whole input has been consumed.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    pub(crate) fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Re-decode the span starting at `start` as a generic value, for
    /// error messages about keys that were consumed as native types.
    pub(crate) fn rerender_key(&self, start: usize) -> String {
        let mut sub = Decoder::new(&self.data[start..], self.profile);
        match sub.value() {
            Ok(v) => v.key_string(),
            Err(_) => String::from("<key>"),
        }
    }

    fn peek(&self) -> Result<u8, Error> {
        wire::peek_u8(self.data, self.pos)
    }

    /// Major type of the next item, after stripping self-described tags.
    pub(crate) fn peek_major(&mut self) -> Result<u8, Error> {
        self.strip_self_described()?;
        Ok(self.peek()? >> 5)
    }

    /// Returns `true` when the next item is null or undefined.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` at the end of input.
    pub fn peek_nil(&mut self) -> Result<bool, Error> {
        self.strip_self_described()?;
        Ok(matches!(self.peek()?, 0xf6 | 0xf7))
    }

    pub(crate) fn read_head_raw(&mut self) -> Result<(u8, u8, usize), Error> {
        let off = self.pos;
        let ib = wire::read_u8(self.data, &mut self.pos)?;
        Ok((ib >> 5, ib & 0x1f, off))
    }

    pub(crate) fn arg(&mut self, ai: u8, off: usize) -> Result<u64, Error> {
        wire::read_uint_arg(self.data, &mut self.pos, ai, off)
    }

    fn len_arg(&mut self, ai: u8, off: usize) -> Result<usize, Error> {
        let len = self.arg(ai, off)?;
        wire::arg_to_usize(len, off)
    }

    /// Consume any number of leading self-described tags (55799).
    ///
    /// # Errors
    ///
    /// Returns structural errors when the input is exhausted mid-header
    /// (not reachable on validated input).
    pub fn strip_self_described(&mut self) -> Result<(), Error> {
        loop {
            let Ok(ib) = self.peek() else { return Ok(()) };
            if ib >> 5 != wire::MAJOR_TAG {
                return Ok(());
            }
            let mut probe = self.pos + 1;
            let num = wire::read_uint_arg(self.data, &mut probe, ib & 0x1f, self.pos)?;
            if num != 55799 {
                return Ok(());
            }
            self.pos = probe;
        }
    }

    fn head(&mut self) -> Result<(u8, u8, usize), Error> {
        self.strip_self_described()?;
        self.read_head_raw()
    }

    fn at_break(&self) -> bool {
        matches!(self.peek(), Ok(wire::BREAK))
    }

    fn consume_break(&mut self) {
        debug_assert!(self.at_break());
        self.pos += 1;
    }

    /// Decode an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for anything but major type 0.
    pub fn parse_u64(&mut self) -> Result<u64, Error> {
        self.parse_u64_as("u64")
    }

    pub(crate) fn parse_u64_as(&mut self, rust_type: &'static str) -> Result<u64, Error> {
        let (major, ai, off) = self.head()?;
        if major != wire::MAJOR_UINT {
            return Err(Error::unmarshal(wire::major_type_name(major), rust_type));
        }
        self.arg(ai, off)
    }

    /// Decode a signed integer from major type 0 or 1.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` on type mismatch or `i64` overflow.
    pub fn parse_i64(&mut self) -> Result<i64, Error> {
        self.parse_i64_as("i64")
    }

    pub(crate) fn parse_i64_as(&mut self, rust_type: &'static str) -> Result<i64, Error> {
        let (major, ai, off) = self.head()?;
        match major {
            wire::MAJOR_UINT => {
                let v = self.arg(ai, off)?;
                i64::try_from(v)
                    .map_err(|_| Error::unmarshal("positive integer", rust_type))
            }
            wire::MAJOR_NINT => {
                let n = self.arg(ai, off)?;
                i64::try_from(n)
                    .map(|n| -1 - n)
                    .map_err(|_| Error::unmarshal("negative integer", rust_type))
            }
            other => Err(Error::unmarshal(wire::major_type_name(other), rust_type)),
        }
    }

    /// Decode an integer of any width, including bignum tags 2/3.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` when the item is not an integer.
    pub fn parse_bigint(&mut self) -> Result<BigInt, Error> {
        let (major, ai, off) = self.head()?;
        match major {
            wire::MAJOR_UINT => Ok(BigInt::from(self.arg(ai, off)?)),
            wire::MAJOR_NINT => {
                let n = self.arg(ai, off)?;
                Ok(BigInt::from_wire(true, &n.to_be_bytes()))
            }
            wire::MAJOR_TAG => {
                let num = self.arg(ai, off)?;
                if num != 2 && num != 3 {
                    return Err(Error::unmarshal("tag", "bignum"));
                }
                let content = self.parse_bignum_content()?;
                Ok(BigInt::from_wire(num == 3, &content))
            }
            other => Err(Error::unmarshal(wire::major_type_name(other), "bignum")),
        }
    }

    /// Read the byte-string content of a tag 2/3 whose header is consumed.
    pub(crate) fn parse_bignum_content(&mut self) -> Result<Vec<u8>, Error> {
        let major = self.peek()? >> 5;
        if major != wire::MAJOR_BYTES {
            return Err(Error::unmarshal(wire::major_type_name(major), "bignum"));
        }
        self.parse_bytes()
    }

    /// Decode a byte string, concatenating indefinite-length chunks.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for non-byte-string items.
    pub fn parse_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let (major, ai, off) = self.head()?;
        if major != wire::MAJOR_BYTES {
            return Err(Error::unmarshal(wire::major_type_name(major), "byte string"));
        }
        self.read_string_body(ai, off)
    }

    /// Decode a text string, concatenating indefinite-length chunks.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for non-text items.
    pub fn parse_text(&mut self) -> Result<String, Error> {
        let (major, ai, off) = self.head()?;
        if major != wire::MAJOR_TEXT {
            return Err(Error::unmarshal(wire::major_type_name(major), "String"));
        }
        let body = self.read_string_body(ai, off)?;
        // UTF-8 was checked during validation, chunk by chunk.
        String::from_utf8(body).map_err(|_| Error::Semantic { offset: off })
    }

    fn read_string_body(&mut self, ai: u8, off: usize) -> Result<Vec<u8>, Error> {
        if ai == wire::AI_INDEFINITE {
            let mut out = Vec::new();
            while !self.at_break() {
                let (_, chunk_ai, chunk_off) = self.read_head_raw()?;
                let len = self.len_arg(chunk_ai, chunk_off)?;
                out.extend_from_slice(wire::read_exact(self.data, &mut self.pos, len)?);
            }
            self.consume_break();
            Ok(out)
        } else {
            let len = self.len_arg(ai, off)?;
            Ok(wire::read_exact(self.data, &mut self.pos, len)?.to_vec())
        }
    }

    /// Decode a boolean.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for anything else.
    pub fn parse_bool(&mut self) -> Result<bool, Error> {
        self.strip_self_described()?;
        match self.peek()? {
            0xf4 => {
                self.pos += 1;
                Ok(false)
            }
            0xf5 => {
                self.pos += 1;
                Ok(true)
            }
            ib => Err(Error::unmarshal(wire::major_type_name(ib >> 5), "bool")),
        }
    }

    /// Decode a float of any width as `f64`.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for non-float items.
    pub fn parse_f64(&mut self) -> Result<f64, Error> {
        self.parse_f64_as("f64")
    }

    pub(crate) fn parse_f64_as(&mut self, rust_type: &'static str) -> Result<f64, Error> {
        Ok(self.parse_float_as(rust_type)?.value())
    }

    /// Decode a float of any width, preserving its wire width.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for non-float items.
    pub fn parse_float(&mut self) -> Result<Float, Error> {
        self.parse_float_as("Float")
    }

    fn parse_float_as(&mut self, rust_type: &'static str) -> Result<Float, Error> {
        let (major, ai, off) = self.head()?;
        if major != wire::MAJOR_SIMPLE {
            return Err(Error::unmarshal(wire::major_type_name(major), rust_type));
        }
        match ai {
            25 => {
                let s = wire::read_exact(self.data, &mut self.pos, 2)?;
                let bits = u64::from(u16::from_be_bytes([s[0], s[1]]));
                Ok(Float::from_width_bits(FloatWidth::F16, bits))
            }
            26 => {
                let s = wire::read_exact(self.data, &mut self.pos, 4)?;
                let bits = u64::from(u32::from_be_bytes([s[0], s[1], s[2], s[3]]));
                Ok(Float::from_width_bits(FloatWidth::F32, bits))
            }
            27 => {
                let s = wire::read_exact(self.data, &mut self.pos, 8)?;
                let bits = u64::from_be_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]]);
                Ok(Float::from_width_bits(FloatWidth::F64, bits))
            }
            _ => {
                let _ = off;
                Err(Error::unmarshal("primitives", rust_type))
            }
        }
    }

    /// Decode null or undefined into `()`.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for anything else.
    pub fn parse_null(&mut self) -> Result<(), Error> {
        self.strip_self_described()?;
        match self.peek()? {
            0xf6 | 0xf7 => {
                self.pos += 1;
                Ok(())
            }
            ib => Err(Error::unmarshal(wire::major_type_name(ib >> 5), "()")),
        }
    }

    /// Decode an array header. `None` means indefinite length: pull items
    /// until [`Decoder::at_array_end`] reports the break.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for non-array items.
    pub fn parse_array_header(&mut self) -> Result<Option<usize>, Error> {
        self.parse_array_header_as("array")
    }

    /// Like [`Decoder::parse_array_header`], with a caller-supplied native
    /// type name for error messages.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for non-array items.
    pub fn parse_array_header_as(
        &mut self,
        rust_type: &'static str,
    ) -> Result<Option<usize>, Error> {
        let (major, ai, off) = self.head()?;
        if major != wire::MAJOR_ARRAY {
            return Err(Error::unmarshal(wire::major_type_name(major), rust_type));
        }
        if ai == wire::AI_INDEFINITE {
            Ok(None)
        } else {
            Ok(Some(self.len_arg(ai, off)?))
        }
    }

    /// Decode a map header. `None` means indefinite length.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for non-map items.
    pub fn parse_map_header(&mut self) -> Result<Option<usize>, Error> {
        self.parse_map_header_as("map")
    }

    /// Like [`Decoder::parse_map_header`], with a caller-supplied native
    /// type name for error messages.
    ///
    /// # Errors
    ///
    /// Returns `UnmarshalType` for non-map items.
    pub fn parse_map_header_as(
        &mut self,
        rust_type: &'static str,
    ) -> Result<Option<usize>, Error> {
        let (major, ai, off) = self.head()?;
        if major != wire::MAJOR_MAP {
            return Err(Error::unmarshal(wire::major_type_name(major), rust_type));
        }
        if ai == wire::AI_INDEFINITE {
            Ok(None)
        } else {
            Ok(Some(self.len_arg(ai, off)?))
        }
    }

    /// Inside an indefinite container, consume a pending break marker.
    ///
    /// Returns `true` when the container ended.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` on exhausted input.
    pub fn at_array_end(&mut self) -> Result<bool, Error> {
        if self.peek()? == wire::BREAK {
            self.consume_break();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Skip exactly one item (including any tags wrapping it).
    ///
    /// # Errors
    ///
    /// Returns structural errors (not reachable on validated input).
    pub fn skip_value(&mut self) -> Result<(), Error> {
        let (major, ai, off) = self.read_head_raw()?;
        match major {
            wire::MAJOR_UINT | wire::MAJOR_NINT => {
                let _ = self.arg(ai, off)?;
            }
            wire::MAJOR_BYTES | wire::MAJOR_TEXT => {
                if ai == wire::AI_INDEFINITE {
                    while !self.at_break() {
                        let (_, chunk_ai, chunk_off) = self.read_head_raw()?;
                        let len = self.len_arg(chunk_ai, chunk_off)?;
                        wire::read_exact(self.data, &mut self.pos, len)?;
                    }
                    self.consume_break();
                } else {
                    let len = self.len_arg(ai, off)?;
                    wire::read_exact(self.data, &mut self.pos, len)?;
                }
            }
            wire::MAJOR_ARRAY => {
                if ai == wire::AI_INDEFINITE {
                    while !self.at_break() {
                        self.skip_value()?;
                    }
                    self.consume_break();
                } else {
                    let len = self.len_arg(ai, off)?;
                    for _ in 0..len {
                        self.skip_value()?;
                    }
                }
            }
            wire::MAJOR_MAP => {
                if ai == wire::AI_INDEFINITE {
                    while !self.at_break() {
                        self.skip_value()?;
                        self.skip_value()?;
                    }
                    self.consume_break();
                } else {
                    let len = self.len_arg(ai, off)?;
                    for _ in 0..len {
                        self.skip_value()?;
                        self.skip_value()?;
                    }
                }
            }
            wire::MAJOR_TAG => {
                let _ = self.arg(ai, off)?;
                self.skip_value()?;
            }
            _ => match ai {
                24 => {
                    wire::read_exact(self.data, &mut self.pos, 1)?;
                }
                25 => {
                    wire::read_exact(self.data, &mut self.pos, 2)?;
                }
                26 => {
                    wire::read_exact(self.data, &mut self.pos, 4)?;
                }
                27 => {
                    wire::read_exact(self.data, &mut self.pos, 8)?;
                }
                _ => {}
            },
        }
        Ok(())
    }

    /// Capture the exact byte span of the next item, self-described tags
    /// stripped, content (including other tags) verbatim.
    ///
    /// # Errors
    ///
    /// Returns structural errors (not reachable on validated input).
    pub fn raw_item(&mut self) -> Result<&'de [u8], Error> {
        self.strip_self_described()?;
        let start = self.pos;
        self.skip_value()?;
        Ok(&self.data[start..self.pos])
    }

    /// Decode the next item into the generic [`Value`] model.
    ///
    /// # Errors
    ///
    /// Returns policy errors (duplicate keys, invalid map key types,
    /// integer overflow under the signed policy) or conversion errors for
    /// built-in tags.
    pub fn value(&mut self) -> Result<Value, Error> {
        let (major, ai, off) = self.head()?;
        match major {
            wire::MAJOR_UINT => {
                let v = self.arg(ai, off)?;
                match self.profile.options().int_dec {
                    IntDecMode::Unsigned => Ok(Value::Uint(v)),
                    IntDecMode::Signed => i64::try_from(v)
                        .map(Value::Int)
                        .map_err(|_| Error::unmarshal("positive integer", "i64")),
                }
            }
            wire::MAJOR_NINT => {
                let n = self.arg(ai, off)?;
                match i64::try_from(n) {
                    Ok(n) => Ok(Value::Int(-1 - n)),
                    // Below i64::MIN; widen to a bignum like the source does.
                    Err(_) => Ok(Value::BigInt(BigInt::from_wire(true, &n.to_be_bytes()))),
                }
            }
            wire::MAJOR_BYTES => {
                let body = self.read_string_body(ai, off)?;
                Ok(Value::Bytes(body))
            }
            wire::MAJOR_TEXT => {
                let body = self.read_string_body(ai, off)?;
                String::from_utf8(body)
                    .map(Value::Text)
                    .map_err(|_| Error::Semantic { offset: off })
            }
            wire::MAJOR_ARRAY => {
                let header = if ai == wire::AI_INDEFINITE {
                    None
                } else {
                    Some(self.len_arg(ai, off)?)
                };
                let mut items = Vec::with_capacity(header.unwrap_or(0).min(4096));
                match header {
                    Some(len) => {
                        for _ in 0..len {
                            items.push(self.value()?);
                        }
                    }
                    None => {
                        while !self.at_array_end()? {
                            items.push(self.value()?);
                        }
                    }
                }
                Ok(Value::Array(items))
            }
            wire::MAJOR_MAP => {
                let header = if ai == wire::AI_INDEFINITE {
                    None
                } else {
                    Some(self.len_arg(ai, off)?)
                };
                self.value_map(header)
            }
            wire::MAJOR_TAG => {
                let num = self.arg(ai, off)?;
                self.value_tag(num)
            }
            _ => match ai {
                0..=19 => Ok(Value::Simple(ai)),
                20 => Ok(Value::Bool(false)),
                21 => Ok(Value::Bool(true)),
                22 => Ok(Value::Null),
                23 => Ok(Value::Undefined),
                24 => {
                    let s = wire::read_exact(self.data, &mut self.pos, 1)?;
                    Ok(Value::Simple(s[0]))
                }
                _ => {
                    self.pos = off;
                    self.parse_float().map(Value::Float)
                }
            },
        }
    }

    fn value_map(&mut self, header: Option<usize>) -> Result<Value, Error> {
        let opts = self.profile.options();
        let mut entries: Vec<(Value, Value)> = Vec::new();
        let mut index = 0usize;
        loop {
            match header {
                Some(len) if index == len => break,
                None if self.at_array_end()? => break,
                _ => {}
            }
            let key = self.value()?;
            if matches!(key, Value::Bytes(_)) && opts.map_key_bytes == MapKeyBytesMode::Fail {
                return Err(Error::InvalidMapKeyType {
                    cbor_type: "byte string",
                });
            }
            if opts.dup_map_key == DupKeyMode::Enforced
                && entries.iter().any(|(seen, _)| *seen == key)
            {
                // Skip the rest of the map before reporting, so the cursor
                // lands past this item.
                self.skip_value()?;
                self.skip_map_rest(header, index + 1)?;
                return Err(Error::DupMapKey {
                    key: key.key_string(),
                    index,
                });
            }
            let value = self.value()?;
            entries.push((key, value));
            index += 1;
        }
        Ok(Value::Map(entries))
    }

    /// Skip remaining entries of a map whose first `consumed` pairs (plus
    /// the current key) were already read.
    pub(crate) fn skip_map_rest(
        &mut self,
        header: Option<usize>,
        consumed: usize,
    ) -> Result<(), Error> {
        match header {
            Some(len) => {
                for _ in consumed..len {
                    self.skip_value()?;
                    self.skip_value()?;
                }
            }
            None => {
                while !self.at_break() {
                    self.skip_value()?;
                    self.skip_value()?;
                }
                self.consume_break();
            }
        }
        Ok(())
    }

    fn value_tag(&mut self, num: u64) -> Result<Value, Error> {
        match num {
            0 | 1 => crate::time::parse_time_content(self, num).map(Value::Time),
            2 | 3 => {
                let content = self.parse_bignum_content()?;
                Ok(Value::BigInt(BigInt::from_wire(num == 3, &content)))
            }
            _ => {
                let content = self.value()?;
                Ok(Value::Tag(num, Box::new(content)))
            }
        }
    }

    /// Verify (and consume) the registered tag chain for a native type.
    ///
    /// # Errors
    ///
    /// Returns `WrongTag` when a required or present chain does not match
    /// the registration.
    pub fn expect_registered_tags(
        &mut self,
        type_id: TypeId,
        rust_type: &'static str,
    ) -> Result<(), Error> {
        let Some(reg) = self.profile.registered_for_type(type_id) else {
            return Ok(());
        };
        self.strip_self_described()?;

        let mut probe = self.pos;
        let mut found = Vec::new();
        while found.len() < reg.nums.len() {
            let Ok(ib) = wire::peek_u8(self.data, probe) else {
                break;
            };
            if ib >> 5 != wire::MAJOR_TAG {
                break;
            }
            let mut next = probe + 1;
            let num = wire::read_uint_arg(self.data, &mut next, ib & 0x1f, probe)?;
            found.push(num);
            probe = next;
        }

        match reg.opts.dec {
            DecTagMode::Ignored => {
                self.pos = probe;
                Ok(())
            }
            DecTagMode::Optional => {
                if found.is_empty() {
                    Ok(())
                } else if found == reg.nums {
                    self.pos = probe;
                    Ok(())
                } else {
                    Err(Error::WrongTag {
                        expected: reg.nums,
                        found,
                        rust_type,
                    })
                }
            }
            DecTagMode::Required => {
                if found == reg.nums {
                    self.pos = probe;
                    Ok(())
                } else {
                    Err(Error::WrongTag {
                        expected: reg.nums,
                        found,
                        rust_type,
                    })
                }
            }
        }
    }
}
