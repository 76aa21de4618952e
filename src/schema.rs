//! Struct shapes and the field-resolution engine.
//!
//! The derive macro emits a static [`StructShape`] per struct — the raw
//! declaration-ordered field table with its typed attributes — plus an
//! accessor impl ([`StructFields`] / [`StructFieldsMut`]) that reaches
//! fields by index. This
//! module turns a shape into the authoritative, flattened field list:
//!
//! - embedded fields are discovered breadth-first by embedding depth,
//! - shadowing and ambiguity rules decide which of several same-key
//!   candidates survives (a lone renamed field dominates; a tie drops the
//!   key entirely),
//! - each surviving field carries a multi-hop index path back to its
//!   storage.
//!
//! Resolution runs once per shape and is cached process-wide; the cache is
//! append-only under a lock and safe for concurrent use.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::codec::{Decode, Encode};
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::profile::{DupKeyMode, UnknownFieldMode};
use crate::value::Value;
use crate::Error;

/// The effective map key of a resolved field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Text key (the field name or its rename).
    Text(&'static str),
    /// Integer key (`keyasint` fields).
    Int(i64),
}

/// Typed output of the field-attribute mini-language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAttr {
    /// Explicit rename, when present.
    pub rename: Option<&'static str>,
    /// Integer map key, when the rename parses as one (`keyasint`).
    pub key_as_int: Option<i64>,
    /// Omit the field when its value is empty for its kind.
    pub omit_empty: bool,
    /// Exclude the field unconditionally (the `-` marker).
    pub skip: bool,
}

impl FieldAttr {
    /// An attribute-free field.
    pub const NONE: Self = Self {
        rename: None,
        key_as_int: None,
        omit_empty: false,
        skip: false,
    };
}

/// One declared field in a shape, in declaration order.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// The Rust field name.
    pub name: &'static str,
    /// Resolved attributes.
    pub attr: FieldAttr,
    /// For embedding-marked struct fields, the nested shape.
    pub embedded: Option<fn() -> &'static StructShape>,
}

/// The static description of a struct, emitted by the derive macro.
#[derive(Debug)]
pub struct StructShape {
    /// The struct's type name, used in error messages.
    pub type_name: &'static str,
    /// Positional array encoding (`toarray`) instead of a map.
    pub as_array: bool,
    /// Declared fields in declaration order.
    pub fields: &'static [FieldDef],
}

/// A borrowed view of one field during encoding.
pub enum FieldRef<'a> {
    /// An ordinary encodable field.
    Leaf(&'a dyn Encode),
    /// An embedded (or embedded-renamed) struct, reachable for recursion.
    Struct(&'a dyn StructFields),
    /// A `None` embedded pointer, or a field excluded from encoding.
    Nil,
}

/// A mutable view of one field during decoding.
pub enum FieldMut<'a> {
    /// An ordinary decodable field.
    Leaf(&'a mut dyn FieldDecode),
    /// An embedded struct; embedded pointers are allocated on first use.
    Struct(&'a mut dyn StructFieldsMut),
    /// A skipped field; never routed to by resolved paths.
    Skipped,
}

/// Read-side field access, implemented by `#[derive(Encode)]`.
pub trait StructFields {
    /// The static shape of this struct.
    fn static_shape() -> &'static StructShape
    where
        Self: Sized;

    /// The shape of this value (object-safe form of
    /// [`StructFields::static_shape`]).
    fn shape(&self) -> &'static StructShape;

    /// Borrow the field at declaration index `idx`.
    fn field(&self, idx: usize) -> FieldRef<'_>;
}

/// Write-side field access, implemented by `#[derive(Decode)]`.
pub trait StructFieldsMut {
    /// The static shape of this struct.
    fn static_shape() -> &'static StructShape
    where
        Self: Sized;

    /// The shape of this value (object-safe form of
    /// [`StructFieldsMut::static_shape`]).
    fn shape(&self) -> &'static StructShape;

    /// Mutably borrow the field at declaration index `idx`, allocating
    /// embedded pointers as needed.
    fn field_mut(&mut self, idx: usize) -> FieldMut<'_>;
}

/// Object-safe decode-into, blanket-implemented for every [`Decode`] type.
pub trait FieldDecode {
    /// Replace `self` with the decoded value.
    ///
    /// # Errors
    ///
    /// Returns whatever the type's [`Decode`] impl returns.
    fn decode_field(&mut self, d: &mut Decoder<'_, '_>) -> Result<(), Error>;
}

impl<T: Decode> FieldDecode for T {
    fn decode_field(&mut self, d: &mut Decoder<'_, '_>) -> Result<(), Error> {
        *self = T::decode(d)?;
        Ok(())
    }
}

pub(crate) struct ResolvedField {
    pub key: FieldKey,
    pub omit_empty: bool,
    pub path: Vec<u16>,
}

pub(crate) struct ResolvedStruct {
    pub as_array: bool,
    pub fields: Vec<ResolvedField>,
}

fn cache() -> &'static RwLock<HashMap<usize, Arc<ResolvedStruct>>> {
    static CACHE: OnceLock<RwLock<HashMap<usize, Arc<ResolvedStruct>>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The resolved field list for a shape, computed on first use.
pub(crate) fn resolved(shape: &'static StructShape) -> Arc<ResolvedStruct> {
    let key = shape as *const StructShape as usize;
    if let Some(hit) = cache()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Arc::clone(hit);
    }
    let built = Arc::new(resolve(shape));
    let mut guard = cache().write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(guard.entry(key).or_insert(built))
}

struct Candidate {
    key: FieldKey,
    tagged: bool,
    omit_empty: bool,
    depth: usize,
    path: Vec<u16>,
}

fn resolve(shape: &'static StructShape) -> ResolvedStruct {
    if shape.as_array {
        let fields = shape
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.attr.skip)
            .map(|(i, f)| ResolvedField {
                key: FieldKey::Text(f.name),
                omit_empty: false,
                path: vec![i as u16],
            })
            .collect();
        return ResolvedStruct {
            as_array: true,
            fields,
        };
    }

    let mut queue: VecDeque<(&'static StructShape, Vec<u16>, usize)> = VecDeque::new();
    let mut visited: HashSet<usize> = HashSet::new();
    visited.insert(shape as *const StructShape as usize);
    queue.push_back((shape, Vec::new(), 0));

    let mut candidates: Vec<Candidate> = Vec::new();
    while let Some((shape, base, depth)) = queue.pop_front() {
        for (i, field) in shape.fields.iter().enumerate() {
            if field.attr.skip {
                continue;
            }
            let mut path = base.clone();
            path.push(i as u16);
            let tagged = field.attr.rename.is_some() || field.attr.key_as_int.is_some();
            if let (Some(nested), false) = (field.embedded, tagged) {
                let nested = nested();
                if visited.insert(nested as *const StructShape as usize) {
                    queue.push_back((nested, path, depth + 1));
                }
                continue;
            }
            let key = match field.attr.key_as_int {
                Some(k) => FieldKey::Int(k),
                None => FieldKey::Text(field.attr.rename.unwrap_or(field.name)),
            };
            candidates.push(Candidate {
                key,
                tagged,
                omit_empty: field.attr.omit_empty,
                depth,
                path,
            });
        }
    }

    let mut groups: HashMap<FieldKey, Vec<Candidate>> = HashMap::new();
    for cand in candidates {
        groups.entry(cand.key).or_default().push(cand);
    }

    let mut kept: Vec<Candidate> = Vec::new();
    for (_, group) in groups {
        let min_depth = group.iter().map(|c| c.depth).min().unwrap_or(0);
        let mut at_min: Vec<Candidate> =
            group.into_iter().filter(|c| c.depth == min_depth).collect();
        if at_min.len() == 1 {
            kept.extend(at_min.pop());
            continue;
        }
        let mut tagged: Vec<Candidate> = at_min.into_iter().filter(|c| c.tagged).collect();
        if tagged.len() == 1 {
            kept.extend(tagged.pop());
        }
        // Two or more candidates at the shallowest depth with no single
        // tagged winner: the key is dropped entirely.
    }

    kept.sort_by(|a, b| a.path.cmp(&b.path));
    ResolvedStruct {
        as_array: false,
        fields: kept
            .into_iter()
            .map(|c| ResolvedField {
                key: c.key,
                omit_empty: c.omit_empty,
                path: c.path,
            })
            .collect(),
    }
}

fn field_at<'a>(v: &'a dyn StructFields, path: &[u16]) -> Option<FieldRef<'a>> {
    match path {
        [] => None,
        [last] => Some(v.field(*last as usize)),
        [head, rest @ ..] => match v.field(*head as usize) {
            FieldRef::Struct(next) => field_at(next, rest),
            // A nil embedded pointer hides everything behind it.
            FieldRef::Nil | FieldRef::Leaf(_) => None,
        },
    }
}

fn field_at_mut<'a>(v: &'a mut dyn StructFieldsMut, path: &[u16]) -> Option<FieldMut<'a>> {
    match path {
        [] => None,
        [last] => Some(v.field_mut(*last as usize)),
        [head, rest @ ..] => match v.field_mut(*head as usize) {
            FieldMut::Struct(next) => field_at_mut(next, rest),
            FieldMut::Leaf(_) | FieldMut::Skipped => None,
        },
    }
}

/// Encode a struct value through its resolved field list.
///
/// # Errors
///
/// Returns any error from field encoding or the container writers.
pub fn encode_struct(v: &dyn StructFields, enc: &mut Encoder<'_>) -> Result<(), Error> {
    let shape = v.shape();
    let fields = resolved(shape);

    if fields.as_array {
        return enc.array(fields.fields.len(), |enc| {
            for field in &fields.fields {
                match field_at(v, &field.path) {
                    Some(FieldRef::Leaf(leaf)) => leaf.encode(enc)?,
                    Some(FieldRef::Struct(nested)) => encode_struct(nested, enc)?,
                    Some(FieldRef::Nil) | None => enc.null()?,
                }
            }
            Ok(())
        });
    }

    let mut entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(fields.fields.len());
    for field in &fields.fields {
        let Some(field_ref) = field_at(v, &field.path) else {
            // A nil embedded pointer on the path contributes no fields.
            continue;
        };
        let value_bytes = match field_ref {
            FieldRef::Leaf(leaf) => {
                if field.omit_empty && leaf.is_empty_value() {
                    continue;
                }
                let mut scratch = enc.scratch();
                leaf.encode(&mut scratch)?;
                scratch.finish_item()?
            }
            FieldRef::Struct(nested) => {
                let mut scratch = enc.scratch();
                encode_struct(nested, &mut scratch)?;
                scratch.finish_item()?
            }
            FieldRef::Nil => {
                if field.omit_empty {
                    continue;
                }
                vec![0xf6]
            }
        };
        let mut key_enc = enc.scratch();
        match field.key {
            FieldKey::Text(name) => key_enc.text(name)?,
            FieldKey::Int(k) => key_enc.int(k)?,
        }
        entries.push((key_enc.finish_item()?, value_bytes));
    }
    enc.splice_map_item(entries)
}

/// Decode a map or positional array into a struct value through its
/// resolved field list.
///
/// Field-level errors are collected best-effort (first error wins, the
/// rest of the map still decodes); duplicate-key and strict-unknown-field
/// errors abort immediately after skipping the remaining input.
///
/// # Errors
///
/// Returns the first recorded field error, or an aborting policy error.
pub fn decode_struct(v: &mut dyn StructFieldsMut, d: &mut Decoder<'_, '_>) -> Result<(), Error> {
    let shape = v.shape();
    let fields = resolved(shape);

    if d.peek_nil()? {
        return Err(Error::unmarshal("primitives", shape.type_name));
    }

    if fields.as_array {
        return decode_struct_array(v, d, shape, &fields);
    }

    let header = d.parse_map_header_as(shape.type_name)?;
    let opts = *d.profile().options();
    let mut matched = vec![false; fields.fields.len()];
    let mut seen_keys: Vec<Value> = Vec::new();
    let mut first_err: Option<Error> = None;
    let mut index = 0usize;

    loop {
        match header {
            Some(len) if index == len => break,
            None if d.at_array_end()? => break,
            _ => {}
        }
        let key = d.value()?;
        if opts.dup_map_key == DupKeyMode::Enforced {
            if seen_keys.iter().any(|seen| key_eq(seen, &key)) {
                d.skip_value()?;
                d.skip_map_rest(header, index + 1)?;
                return Err(Error::DupMapKey {
                    key: key.key_string(),
                    index,
                });
            }
            seen_keys.push(key.clone());
        }
        match match_field(&fields.fields, &matched, &key) {
            Some(j) => {
                matched[j] = true;
                decode_field_at(v, &fields.fields[j], d, shape, &mut first_err)?;
            }
            None => {
                if opts.unknown_fields == UnknownFieldMode::Error {
                    d.skip_value()?;
                    d.skip_map_rest(header, index + 1)?;
                    return Err(Error::UnknownField { index });
                }
                d.skip_value()?;
            }
        }
        index += 1;
    }
    first_err.map_or(Ok(()), Err)
}

fn decode_struct_array(
    v: &mut dyn StructFieldsMut,
    d: &mut Decoder<'_, '_>,
    shape: &StructShape,
    fields: &ResolvedStruct,
) -> Result<(), Error> {
    let header = d.parse_array_header_as(shape.type_name)?;
    if let Some(len) = header {
        if len != fields.fields.len() {
            for _ in 0..len {
                d.skip_value()?;
            }
            return Err(Error::unmarshal("array", shape.type_name));
        }
    }
    let mut first_err: Option<Error> = None;
    match header {
        Some(_) => {
            for field in &fields.fields {
                decode_field_at(v, field, d, shape, &mut first_err)?;
            }
        }
        None => {
            for field in &fields.fields {
                if d.at_array_end()? {
                    return Err(Error::unmarshal("array", shape.type_name));
                }
                decode_field_at(v, field, d, shape, &mut first_err)?;
            }
            if !d.at_array_end()? {
                while !d.at_array_end()? {
                    d.skip_value()?;
                }
                return Err(Error::unmarshal("array", shape.type_name));
            }
        }
    }
    first_err.map_or(Ok(()), Err)
}

fn decode_field_at(
    v: &mut dyn StructFieldsMut,
    field: &ResolvedField,
    d: &mut Decoder<'_, '_>,
    shape: &StructShape,
    first_err: &mut Option<Error>,
) -> Result<(), Error> {
    let start = d.position();
    let result = match field_at_mut(v, &field.path) {
        Some(FieldMut::Leaf(leaf)) => leaf.decode_field(d),
        Some(FieldMut::Struct(nested)) => {
            if d.peek_nil()? {
                // Null into a struct field leaves it at its default.
                d.skip_value()
            } else {
                decode_struct(nested, d)
            }
        }
        Some(FieldMut::Skipped) | None => d.skip_value(),
    };
    if let Err(err) = result {
        // Resync the cursor past this item, then record the first error.
        d.set_position(start);
        d.skip_value()?;
        if first_err.is_none() {
            let label = match field.key {
                FieldKey::Text(name) => format!("{}.{name}", shape.type_name),
                FieldKey::Int(k) => format!("{}.{k}", shape.type_name),
            };
            *first_err = Some(err.with_field(&label));
        }
    }
    Ok(())
}

/// Integer-normalizing equality for duplicate-key detection.
fn key_eq(a: &Value, b: &Value) -> bool {
    fn as_int(v: &Value) -> Option<i128> {
        match v {
            Value::Uint(u) => Some(i128::from(*u)),
            Value::Int(i) => Some(i128::from(*i)),
            _ => None,
        }
    }
    match (as_int(a), as_int(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Exact match first, then ASCII case-insensitive, both skipping fields
/// already matched in this pass.
fn match_field(fields: &[ResolvedField], matched: &[bool], key: &Value) -> Option<usize> {
    match key {
        Value::Text(s) => {
            let exact = fields.iter().enumerate().position(|(j, f)| {
                !matched[j] && matches!(f.key, FieldKey::Text(name) if name == s.as_str())
            });
            exact.or_else(|| {
                fields.iter().enumerate().position(|(j, f)| {
                    !matched[j]
                        && matches!(f.key, FieldKey::Text(name) if name.eq_ignore_ascii_case(s))
                })
            })
        }
        Value::Uint(u) => {
            let k = i64::try_from(*u).ok()?;
            fields
                .iter()
                .enumerate()
                .position(|(j, f)| !matched[j] && f.key == FieldKey::Int(k))
        }
        Value::Int(i) => fields
            .iter()
            .enumerate()
            .position(|(j, f)| !matched[j] && f.key == FieldKey::Int(*i)),
        _ => None,
    }
}
