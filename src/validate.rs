//! Structural well-formedness validation.
//!
//! Decoding is two-phase: this pass checks the entire input — header
//! consistency, reserved values, indefinite-length chunk and break rules,
//! UTF-8 validity, nesting and element-count limits — before any value is
//! materialized. A malformed or over-limit document is rejected wholesale,
//! so decode targets are never left partially filled by structural errors.
//!
//! The scanner is iterative with an explicit frame stack; recursion depth
//! does not depend on input nesting.

use crate::profile::{DecodeOptions, TagsMode};
use crate::{utf8, wire, Error};

enum Frame {
    Root { remaining: usize },
    Array { remaining: usize },
    ArrayIndef { items: usize },
    Map { remaining_items: usize },
    MapIndef { items: usize },
    Tag { remaining: usize },
    StrChunks { major: u8 },
}

impl Frame {
    const fn is_done(&self) -> bool {
        match self {
            Self::Root { remaining } | Self::Tag { remaining } | Self::Array { remaining } => {
                *remaining == 0
            }
            Self::Map { remaining_items } => *remaining_items == 0,
            Self::ArrayIndef { .. } | Self::MapIndef { .. } | Self::StrChunks { .. } => false,
        }
    }

    const fn counts_depth(&self) -> bool {
        !matches!(self, Self::Root { .. } | Self::StrChunks { .. })
    }
}

/// Validate the whole input as exactly one well-formed item.
pub(crate) fn well_formed(data: &[u8], opts: &DecodeOptions) -> Result<(), Error> {
    let end = well_formed_prefix(data, 0, opts)?;
    if end != data.len() {
        return Err(Error::TrailingBytes { offset: end });
    }
    Ok(())
}

/// Validate one well-formed item starting at `start`; returns its end.
pub(crate) fn well_formed_prefix(
    data: &[u8],
    start: usize,
    opts: &DecodeOptions,
) -> Result<usize, Error> {
    let mut pos = start;
    let mut depth = 0usize;
    let mut stack: Vec<Frame> = vec![Frame::Root { remaining: 1 }];

    loop {
        while stack.last().is_some_and(Frame::is_done) {
            if let Some(frame) = stack.pop() {
                if frame.counts_depth() {
                    depth -= 1;
                }
            }
            if stack.is_empty() {
                return Ok(pos);
            }
        }

        let off = pos;
        let ib = wire::read_u8(data, &mut pos)?;

        if ib == wire::BREAK {
            let closed = match stack.pop() {
                Some(Frame::ArrayIndef { .. }) => true,
                Some(Frame::MapIndef { items }) => {
                    if items % 2 != 0 {
                        return Err(Error::UnexpectedBreak { offset: off });
                    }
                    true
                }
                Some(Frame::StrChunks { .. }) => false,
                _ => return Err(Error::UnexpectedBreak { offset: off }),
            };
            if closed {
                depth -= 1;
            }
            continue;
        }

        let major = ib >> 5;
        let ai = ib & 0x1f;

        // Chunks of an indefinite-length string must be definite strings of
        // the same major type.
        if let Some(Frame::StrChunks { major: m }) = stack.last() {
            if major != *m || ai == wire::AI_INDEFINITE {
                return Err(Error::InvalidChunk { offset: off });
            }
        }

        consume_item(&mut stack, opts, off)?;

        match major {
            0 | 1 => {
                let _ = wire::read_uint_arg(data, &mut pos, ai, off)?;
            }
            2 | 3 => {
                if ai == wire::AI_INDEFINITE {
                    stack.push(Frame::StrChunks { major });
                } else {
                    let len = wire::read_uint_arg(data, &mut pos, ai, off)?;
                    let len = wire::arg_to_usize(len, off)?;
                    let payload = wire::read_exact(data, &mut pos, len)?;
                    if major == 3 && utf8::validate(payload).is_err() {
                        return Err(Error::Semantic { offset: off });
                    }
                }
            }
            4 => {
                if ai == wire::AI_INDEFINITE {
                    enter(&mut stack, &mut depth, opts, off, Frame::ArrayIndef { items: 0 })?;
                } else {
                    let len = wire::read_uint_arg(data, &mut pos, ai, off)?;
                    let len = wire::arg_to_usize(len, off)?;
                    if len > opts.max_array_elements {
                        return Err(Error::ArrayLimit {
                            len,
                            max: opts.max_array_elements,
                            offset: off,
                        });
                    }
                    if len > 0 {
                        enter(&mut stack, &mut depth, opts, off, Frame::Array { remaining: len })?;
                    }
                }
            }
            5 => {
                if ai == wire::AI_INDEFINITE {
                    enter(&mut stack, &mut depth, opts, off, Frame::MapIndef { items: 0 })?;
                } else {
                    let pairs = wire::read_uint_arg(data, &mut pos, ai, off)?;
                    let pairs = wire::arg_to_usize(pairs, off)?;
                    if pairs > opts.max_map_pairs {
                        return Err(Error::MapLimit {
                            len: pairs,
                            max: opts.max_map_pairs,
                            offset: off,
                        });
                    }
                    let items = pairs
                        .checked_mul(2)
                        .ok_or(Error::LengthOverflow { offset: off })?;
                    if items > 0 {
                        enter(
                            &mut stack,
                            &mut depth,
                            opts,
                            off,
                            Frame::Map {
                                remaining_items: items,
                            },
                        )?;
                    }
                }
            }
            6 => {
                if opts.tags == TagsMode::Forbidden {
                    return Err(Error::TagsForbidden);
                }
                let _ = wire::read_uint_arg(data, &mut pos, ai, off)?;
                enter(&mut stack, &mut depth, opts, off, Frame::Tag { remaining: 1 })?;
            }
            _ => match ai {
                0..=23 => {}
                24 => {
                    let v = wire::read_u8(data, &mut pos)?;
                    if v < 32 {
                        // Two-byte simple values below 32 are not well-formed.
                        return Err(Error::ReservedAdditionalInfo { ai: 24, offset: off });
                    }
                }
                25 => {
                    let _ = wire::read_exact(data, &mut pos, 2)?;
                }
                26 => {
                    let _ = wire::read_exact(data, &mut pos, 4)?;
                }
                27 => {
                    let _ = wire::read_exact(data, &mut pos, 8)?;
                }
                _ => {
                    return Err(Error::ReservedAdditionalInfo { ai, offset: off });
                }
            },
        }
    }
}

/// Account one started item against the innermost frame.
fn consume_item(stack: &mut [Frame], opts: &DecodeOptions, off: usize) -> Result<(), Error> {
    match stack.last_mut() {
        Some(Frame::Root { remaining } | Frame::Tag { remaining } | Frame::Array { remaining }) => {
            *remaining -= 1;
        }
        Some(Frame::Map { remaining_items }) => {
            *remaining_items -= 1;
        }
        Some(Frame::ArrayIndef { items }) => {
            *items += 1;
            if *items > opts.max_array_elements {
                return Err(Error::ArrayLimit {
                    len: *items,
                    max: opts.max_array_elements,
                    offset: off,
                });
            }
        }
        Some(Frame::MapIndef { items }) => {
            *items += 1;
            if *items > opts.max_map_pairs * 2 {
                return Err(Error::MapLimit {
                    len: items.div_ceil(2),
                    max: opts.max_map_pairs,
                    offset: off,
                });
            }
        }
        Some(Frame::StrChunks { .. }) | None => {}
    }
    Ok(())
}

fn enter(
    stack: &mut Vec<Frame>,
    depth: &mut usize,
    opts: &DecodeOptions,
    off: usize,
    frame: Frame,
) -> Result<(), Error> {
    if *depth == opts.max_nesting {
        return Err(Error::DepthLimit {
            max: opts.max_nesting,
            offset: off,
        });
    }
    *depth += 1;
    stack.push(frame);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::well_formed;
    use crate::profile::DecodeOptions;
    use crate::Error;

    fn check(data: &[u8]) -> Result<(), Error> {
        well_formed(data, &DecodeOptions::default())
    }

    #[test]
    fn accepts_basic_items() {
        for item in [
            &[0x00][..],
            &[0x17],
            &[0x18, 0x18],
            &[0x20],
            &[0xf6],
            &[0xf9, 0x3e, 0x00],
            &[0x63, 0x61, 0x62, 0x63],
            &[0x82, 0x01, 0x02],
            &[0xa1, 0x61, 0x61, 0x01],
            &[0xc2, 0x42, 0x01, 0x00],
            // indefinite array [_ 1, 2]
            &[0x9f, 0x01, 0x02, 0xff],
            // indefinite map {_ "a": 1}
            &[0xbf, 0x61, 0x61, 0x01, 0xff],
            // chunked text (_ "ab", "c")
            &[0x7f, 0x62, 0x61, 0x62, 0x61, 0x63, 0xff],
        ] {
            check(item).unwrap_or_else(|e| panic!("{item:02x?}: {e}"));
        }
    }

    #[test]
    fn rejects_truncation_and_trailing() {
        assert!(matches!(check(&[]), Err(Error::UnexpectedEof { .. })));
        assert!(matches!(check(&[0x18]), Err(Error::UnexpectedEof { .. })));
        assert!(matches!(
            check(&[0x62, 0x61]),
            Err(Error::UnexpectedEof { .. })
        ));
        assert!(matches!(
            check(&[0x82, 0x01]),
            Err(Error::UnexpectedEof { .. })
        ));
        assert!(matches!(
            check(&[0x00, 0x01]),
            Err(Error::TrailingBytes { offset: 1 })
        ));
    }

    #[test]
    fn rejects_reserved_and_misplaced_markers() {
        for ai in [0x1cu8, 0x1d, 0x1e] {
            assert!(matches!(
                check(&[ai]),
                Err(Error::ReservedAdditionalInfo { .. })
            ));
        }
        // Bare break, break in definite array, lone two-byte simple < 32.
        assert!(matches!(check(&[0xff]), Err(Error::UnexpectedBreak { .. })));
        assert!(matches!(
            check(&[0x82, 0x01, 0xff]),
            Err(Error::UnexpectedBreak { .. })
        ));
        assert!(matches!(
            check(&[0xf8, 0x1f]),
            Err(Error::ReservedAdditionalInfo { .. })
        ));
        // Indefinite-length integer does not exist.
        assert!(matches!(
            check(&[0x1f]),
            Err(Error::ReservedAdditionalInfo { .. })
        ));
    }

    #[test]
    fn rejects_odd_indefinite_map() {
        assert!(matches!(
            check(&[0xbf, 0x61, 0x61, 0xff]),
            Err(Error::UnexpectedBreak { .. })
        ));
    }

    #[test]
    fn rejects_wrong_chunk_types() {
        // Text chunk inside indefinite byte string.
        assert!(matches!(
            check(&[0x5f, 0x61, 0x61, 0xff]),
            Err(Error::InvalidChunk { .. })
        ));
        // Nested indefinite chunk.
        assert!(matches!(
            check(&[0x7f, 0x7f, 0x61, 0x61, 0xff, 0xff]),
            Err(Error::InvalidChunk { .. })
        ));
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(matches!(
            check(&[0x62, 0xc3, 0x28]),
            Err(Error::Semantic { offset: 0 })
        ));
        // Chunk boundaries must not split a character.
        assert!(matches!(
            check(&[0x7f, 0x61, 0xc3, 0x61, 0xa9, 0xff]),
            Err(Error::Semantic { .. })
        ));
    }

    #[test]
    fn enforces_depth_limit() {
        let opts = DecodeOptions::default();
        let mut nested = vec![0x81u8; opts.max_nesting];
        nested.push(0x01);
        well_formed(&nested, &opts).unwrap();

        let mut too_deep = vec![0x81u8; opts.max_nesting + 1];
        too_deep.push(0x01);
        assert!(matches!(
            well_formed(&too_deep, &opts),
            Err(Error::DepthLimit { .. })
        ));
    }

    #[test]
    fn enforces_container_limits() {
        let opts = DecodeOptions {
            max_array_elements: 16,
            max_map_pairs: 16,
            ..DecodeOptions::default()
        };
        // Header alone declares too many elements; no body needed.
        assert!(matches!(
            well_formed(&[0x98, 0x11], &opts),
            Err(Error::ArrayLimit { len: 17, .. })
        ));
        let mut indef = vec![0x9f];
        indef.extend(std::iter::repeat(0x00).take(17));
        indef.push(0xff);
        assert!(matches!(
            well_formed(&indef, &opts),
            Err(Error::ArrayLimit { .. })
        ));
        assert!(matches!(
            well_formed(&[0xb8, 0x11], &opts),
            Err(Error::MapLimit { len: 17, .. })
        ));
    }
}
