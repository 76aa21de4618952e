//! Date/time encoding and decoding (CBOR tags 0 and 1).
//!
//! Content follows the profile's [`TimeMode`]; the standard tag is only
//! emitted under [`TimeTagMode::Required`]. Decoding accepts tagged and
//! bare content: RFC 3339 text, integer seconds, or float seconds.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::profile::{TimeMode, TimeTagMode};
use crate::wire;
use crate::Error;

const NANOS_PER_SEC: i128 = 1_000_000_000;

fn out_of_range() -> Error {
    Error::UnsupportedType {
        type_name: "date/time beyond RFC 3339 range",
    }
}

/// Encode `t` under the encoder profile's time policies.
pub(crate) fn encode_time(enc: &mut Encoder<'_>, t: &OffsetDateTime) -> Result<(), Error> {
    let opts = *enc.profile().options();
    let content = |enc: &mut Encoder<'_>| -> Result<(), Error> {
        match opts.time {
            TimeMode::Unix => enc.int(t.unix_timestamp()),
            TimeMode::UnixMicro => enc.f64(unix_micro_seconds(t)),
            TimeMode::UnixDynamic => {
                if t.unix_timestamp_nanos() % NANOS_PER_SEC == 0 {
                    enc.int(t.unix_timestamp())
                } else {
                    enc.f64(unix_micro_seconds(t))
                }
            }
            TimeMode::Rfc3339 => {
                let whole = t.replace_nanosecond(0).map_err(|_| out_of_range())?;
                let text = whole.format(&Rfc3339).map_err(|_| out_of_range())?;
                enc.text(&text)
            }
            TimeMode::Rfc3339Nano => {
                let text = t.format(&Rfc3339).map_err(|_| out_of_range())?;
                enc.text(&text)
            }
        }
    };

    if opts.time_tag == TimeTagMode::Required {
        let numeric = matches!(
            opts.time,
            TimeMode::Unix | TimeMode::UnixMicro | TimeMode::UnixDynamic
        );
        enc.tag(if numeric { 1 } else { 0 }, content)
    } else {
        content(enc)
    }
}

/// Unix seconds as a float, truncated to microsecond granularity.
fn unix_micro_seconds(t: &OffsetDateTime) -> f64 {
    let micros = t.unix_timestamp_nanos() / 1_000;
    micros as f64 / 1e6
}

/// Decode a date/time item, consuming an optional leading tag 0/1.
pub(crate) fn decode_time(d: &mut Decoder<'_, '_>) -> Result<OffsetDateTime, Error> {
    d.strip_self_described()?;
    if d.peek_major()? == wire::MAJOR_TAG {
        let (_, ai, off) = d.read_head_raw()?;
        let num = d.arg(ai, off)?;
        if num > 1 {
            return Err(Error::WrongTag {
                expected: vec![0, 1],
                found: vec![num],
                rust_type: "OffsetDateTime",
            });
        }
        return parse_time_content(d, num);
    }
    parse_untagged_time(d)
}

/// Decode the content of an already-consumed tag 0 or tag 1 header.
pub(crate) fn parse_time_content(
    d: &mut Decoder<'_, '_>,
    tag: u64,
) -> Result<OffsetDateTime, Error> {
    let major = d.peek_major()?;
    match tag {
        0 => {
            if major != wire::MAJOR_TEXT {
                return Err(Error::unmarshal(
                    wire::major_type_name(major),
                    "tag 0 date/time text",
                ));
            }
            parse_untagged_time(d)
        }
        _ => {
            let numeric = matches!(major, wire::MAJOR_UINT | wire::MAJOR_NINT)
                || major == wire::MAJOR_SIMPLE;
            if !numeric {
                return Err(Error::unmarshal(
                    wire::major_type_name(major),
                    "tag 1 epoch date/time",
                ));
            }
            parse_untagged_time(d)
        }
    }
}

fn parse_untagged_time(d: &mut Decoder<'_, '_>) -> Result<OffsetDateTime, Error> {
    let major = d.peek_major()?;
    match major {
        wire::MAJOR_TEXT => {
            let text = d.parse_text()?;
            OffsetDateTime::parse(&text, &Rfc3339)
                .map_err(|_| Error::unmarshal("UTF-8 text string", "OffsetDateTime"))
        }
        wire::MAJOR_UINT | wire::MAJOR_NINT => {
            let secs = d.parse_i64_as("OffsetDateTime")?;
            OffsetDateTime::from_unix_timestamp(secs)
                .map_err(|_| Error::unmarshal("integer", "OffsetDateTime"))
        }
        wire::MAJOR_SIMPLE => {
            let secs = d.parse_f64_as("OffsetDateTime")?;
            if !secs.is_finite() {
                return Err(Error::unmarshal("primitives", "OffsetDateTime"));
            }
            let nanos = (secs * 1e9) as i128;
            OffsetDateTime::from_unix_timestamp_nanos(nanos)
                .map_err(|_| Error::unmarshal("primitives", "OffsetDateTime"))
        }
        other => Err(Error::unmarshal(
            wire::major_type_name(other),
            "OffsetDateTime",
        )),
    }
}
