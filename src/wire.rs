//! Low-level wire primitives: header reads and minimal-width header writes.
//!
//! Readers accept any well-formed RFC 8949 header (including non-minimal
//! argument widths); canonicality is an encode-side concern. The writer
//! always emits the minimal width for the argument.

use crate::Error;

/// Major type 0: unsigned integer.
pub(crate) const MAJOR_UINT: u8 = 0;
/// Major type 1: negative integer.
pub(crate) const MAJOR_NINT: u8 = 1;
/// Major type 2: byte string.
pub(crate) const MAJOR_BYTES: u8 = 2;
/// Major type 3: text string.
pub(crate) const MAJOR_TEXT: u8 = 3;
/// Major type 4: array.
pub(crate) const MAJOR_ARRAY: u8 = 4;
/// Major type 5: map.
pub(crate) const MAJOR_MAP: u8 = 5;
/// Major type 6: tag.
pub(crate) const MAJOR_TAG: u8 = 6;
/// Major type 7: simple values and floats.
pub(crate) const MAJOR_SIMPLE: u8 = 7;

/// Additional-information value marking indefinite length (or break).
pub(crate) const AI_INDEFINITE: u8 = 31;

/// The break marker terminating indefinite-length items.
pub(crate) const BREAK: u8 = 0xff;

pub(crate) fn read_u8(data: &[u8], pos: &mut usize) -> Result<u8, Error> {
    let off = *pos;
    let b = *data.get(off).ok_or(Error::UnexpectedEof { offset: off })?;
    *pos = off + 1;
    Ok(b)
}

pub(crate) fn peek_u8(data: &[u8], pos: usize) -> Result<u8, Error> {
    data.get(pos)
        .copied()
        .ok_or(Error::UnexpectedEof { offset: pos })
}

pub(crate) fn read_exact<'a>(
    data: &'a [u8],
    pos: &mut usize,
    n: usize,
) -> Result<&'a [u8], Error> {
    let off = *pos;
    let end = off
        .checked_add(n)
        .ok_or(Error::LengthOverflow { offset: off })?;
    if end > data.len() {
        return Err(Error::UnexpectedEof { offset: off });
    }
    let s = &data[off..end];
    *pos = end;
    Ok(s)
}

/// Read the argument following an initial byte with additional info `ai`.
///
/// `off` is the offset of the initial byte, used for error reporting.
pub(crate) fn read_uint_arg(
    data: &[u8],
    pos: &mut usize,
    ai: u8,
    off: usize,
) -> Result<u64, Error> {
    match ai {
        0..=23 => Ok(u64::from(ai)),
        24 => Ok(u64::from(read_u8(data, pos)?)),
        25 => {
            let s = read_exact(data, pos, 2)?;
            Ok(u64::from(u16::from_be_bytes([s[0], s[1]])))
        }
        26 => {
            let s = read_exact(data, pos, 4)?;
            Ok(u64::from(u32::from_be_bytes([s[0], s[1], s[2], s[3]])))
        }
        27 => {
            let s = read_exact(data, pos, 8)?;
            Ok(u64::from_be_bytes([
                s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
            ]))
        }
        _ => Err(Error::ReservedAdditionalInfo { ai, offset: off }),
    }
}

pub(crate) fn arg_to_usize(len: u64, off: usize) -> Result<usize, Error> {
    usize::try_from(len).map_err(|_| Error::LengthOverflow { offset: off })
}

/// Write a header with the minimal argument width for `value`.
pub(crate) fn write_head(buf: &mut Vec<u8>, major: u8, value: u64) {
    debug_assert!(major <= 7);
    if value < 24 {
        buf.push((major << 5) | value as u8);
    } else if let Ok(v8) = u8::try_from(value) {
        buf.push((major << 5) | 24);
        buf.push(v8);
    } else if let Ok(v16) = u16::try_from(value) {
        buf.push((major << 5) | 25);
        buf.extend_from_slice(&v16.to_be_bytes());
    } else if let Ok(v32) = u32::try_from(value) {
        buf.push((major << 5) | 26);
        buf.extend_from_slice(&v32.to_be_bytes());
    } else {
        buf.push((major << 5) | 27);
        buf.extend_from_slice(&value.to_be_bytes());
    }
}

/// Write the indefinite-length header for `major`.
pub(crate) fn write_indefinite_head(buf: &mut Vec<u8>, major: u8) {
    buf.push((major << 5) | AI_INDEFINITE);
}

/// Human-readable CBOR type name for a major type, used in error messages.
pub(crate) fn major_type_name(major: u8) -> &'static str {
    match major {
        MAJOR_UINT => "positive integer",
        MAJOR_NINT => "negative integer",
        MAJOR_BYTES => "byte string",
        MAJOR_TEXT => "UTF-8 text string",
        MAJOR_ARRAY => "array",
        MAJOR_MAP => "map",
        MAJOR_TAG => "tag",
        _ => "primitives",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_head_boundaries() {
        let cases: &[(u64, &[u8])] = &[
            (0, &[0x00]),
            (23, &[0x17]),
            (24, &[0x18, 0x18]),
            (255, &[0x18, 0xff]),
            (256, &[0x19, 0x01, 0x00]),
            (65_535, &[0x19, 0xff, 0xff]),
            (65_536, &[0x1a, 0x00, 0x01, 0x00, 0x00]),
            (u64::from(u32::MAX), &[0x1a, 0xff, 0xff, 0xff, 0xff]),
            (
                u64::from(u32::MAX) + 1,
                &[0x1b, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00],
            ),
        ];
        for (value, want) in cases {
            let mut buf = Vec::new();
            write_head(&mut buf, MAJOR_UINT, *value);
            assert_eq!(buf, *want, "value {value}");
        }
    }

    #[test]
    fn uint_arg_round_trips_all_widths() {
        for value in [0u64, 23, 24, 255, 256, 65_536, u64::MAX] {
            let mut buf = Vec::new();
            write_head(&mut buf, MAJOR_UINT, value);
            let mut pos = 1;
            let ai = buf[0] & 0x1f;
            assert_eq!(read_uint_arg(&buf, &mut pos, ai, 0).unwrap(), value);
            assert_eq!(pos, buf.len());
        }
    }

    #[test]
    fn reserved_ai_is_rejected() {
        for ai in 28u8..=30 {
            let err = read_uint_arg(&[], &mut 0, ai, 7).unwrap_err();
            assert_eq!(err, Error::ReservedAdditionalInfo { ai, offset: 7 });
        }
    }
}
