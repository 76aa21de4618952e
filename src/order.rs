//! Canonical map-key ordering.
//!
//! Both orders are pure functions of the *encoded* key bytes; native key
//! values never participate. Sorting is stable, so equal keys keep their
//! insertion order (the encoder does not deduplicate).

use core::cmp::Ordering;

use crate::profile::SortMode;

/// RFC 7049 canonical order: shorter encoded key first, ties bytewise.
#[inline]
#[must_use]
pub fn cmp_length_first(a: &[u8], b: &[u8]) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}

/// RFC 8949 §4.2.1 deterministic order: bytewise-lexical comparison of the
/// encoded keys.
#[inline]
#[must_use]
pub fn cmp_bytewise_lexical(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Sort encoded `(key, value)` entries in place according to `mode`.
pub(crate) fn sort_entries(mode: SortMode, entries: &mut [(Vec<u8>, Vec<u8>)]) {
    match mode {
        SortMode::None => {}
        SortMode::LengthFirst => entries.sort_by(|a, b| cmp_length_first(&a.0, &b.0)),
        SortMode::BytewiseLexical => entries.sort_by(|a, b| cmp_bytewise_lexical(&a.0, &b.0)),
    }
}
