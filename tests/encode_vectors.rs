//! Byte-exact encoding vectors, cross-checked against RFC 8949 appendix A
//! and the deterministic-encoding rules.

use hex_literal::hex;
use polycbor::{
    BigIntMode, ByteString, EncodeOptions, EncodeProfile, Error, FloatMode, InfMode, NanMode,
    RawValue, TimeMode, TimeTagMode, Value,
};
use time::OffsetDateTime;

fn profile(opts: EncodeOptions) -> EncodeProfile {
    EncodeProfile::new(opts).unwrap()
}

fn default_vec<T: polycbor::Encode + ?Sized>(v: &T) -> Vec<u8> {
    polycbor::to_vec(v).unwrap()
}

#[test]
fn uint_minimal_headers() {
    let cases: &[(u64, &[u8])] = &[
        (0, &hex!("00")),
        (1, &hex!("01")),
        (10, &hex!("0a")),
        (23, &hex!("17")),
        (24, &hex!("1818")),
        (25, &hex!("1819")),
        (100, &hex!("1864")),
        (255, &hex!("18ff")),
        (256, &hex!("190100")),
        (1000, &hex!("1903e8")),
        (65535, &hex!("19ffff")),
        (65536, &hex!("1a00010000")),
        (1000000, &hex!("1a000f4240")),
        (1000000000000, &hex!("1b000000e8d4a51000")),
        (u64::MAX, &hex!("1bffffffffffffffff")),
    ];
    for (value, want) in cases {
        assert_eq!(default_vec(value), *want, "value {value}");
    }
}

#[test]
fn nint_minimal_headers() {
    let cases: &[(i64, &[u8])] = &[
        (-1, &hex!("20")),
        (-10, &hex!("29")),
        (-24, &hex!("37")),
        (-25, &hex!("3818")),
        (-100, &hex!("3863")),
        (-256, &hex!("38ff")),
        (-257, &hex!("390100")),
        (-1000, &hex!("3903e7")),
        (i64::MIN, &hex!("3b7fffffffffffffff")),
    ];
    for (value, want) in cases {
        assert_eq!(default_vec(value), *want, "value {value}");
    }
}

#[test]
fn strings_and_simple_values() {
    assert_eq!(default_vec(&String::from("abc")), hex!("63616263"));
    assert_eq!(default_vec(""), hex!("60"));
    assert_eq!(
        default_vec(&ByteString::new(vec![1, 2, 3, 4])),
        hex!("4401020304")
    );
    assert_eq!(default_vec(&true), hex!("f5"));
    assert_eq!(default_vec(&false), hex!("f4"));
    assert_eq!(default_vec(&Option::<u64>::None), hex!("f6"));
    assert_eq!(default_vec(&Value::Undefined), hex!("f7"));
    assert_eq!(default_vec(&Value::Simple(255)), hex!("f8ff"));
    assert_eq!(default_vec(&vec![1u64, 2, 3]), hex!("83010203"));
}

#[test]
fn shortest_float_narrows_bit_exactly() {
    let shortest = profile(EncodeOptions {
        float: FloatMode::Shortest,
        ..EncodeOptions::default()
    });
    assert_eq!(shortest.to_vec(&1.5f64).unwrap(), hex!("f93e00"));
    assert_eq!(shortest.to_vec(&0.0f64).unwrap(), hex!("f90000"));
    assert_eq!(shortest.to_vec(&-0.0f64).unwrap(), hex!("f98000"));
    assert_eq!(shortest.to_vec(&65504.0f64).unwrap(), hex!("f97bff"));
    // 100000 does not fit float16 but fits float32.
    assert_eq!(shortest.to_vec(&100_000.0f64).unwrap(), hex!("fa47c35000"));
    // 1.1 requires the full 64 bits.
    assert_eq!(
        shortest.to_vec(&1.1f64).unwrap(),
        hex!("fb3ff199999999999a")
    );
    // Subnormal float16: 5.960464477539063e-8 is the smallest.
    assert_eq!(
        shortest.to_vec(&5.960464477539063e-8f64).unwrap(),
        hex!("f90001")
    );
}

#[test]
fn float_width_preserved_without_shortest() {
    assert_eq!(default_vec(&1.5f32), hex!("fa3fc00000"));
    assert_eq!(default_vec(&1.5f64), hex!("fb3ff8000000000000"));
}

#[test]
fn nan_mode_vectors() {
    let cases: &[(NanMode, u32, &[u8])] = &[
        (NanMode::Canonical, 0x7fc0_0001, &hex!("f97e00")),
        (NanMode::Preserve, 0x7fc0_0001, &hex!("fa7fc00001")),
        (NanMode::PreserveSignal, 0x7fc0_0001, &hex!("fa7fc00001")),
        (NanMode::Quiet, 0x7fc0_0001, &hex!("fa7fc00001")),
        // sNaN with only high payload bits: shrinks once quieted.
        (NanMode::Preserve, 0x7f80_2000, &hex!("fa7f802000")),
        (NanMode::PreserveSignal, 0x7f80_2000, &hex!("f97c01")),
        (NanMode::Quiet, 0x7f80_2000, &hex!("f97e01")),
        // Negative qNaN with shrinkable payload.
        (NanMode::PreserveSignal, 0xffc0_2000, &hex!("f9fe01")),
        (NanMode::Quiet, 0xffc0_2000, &hex!("f9fe01")),
    ];
    for (mode, bits, want) in cases {
        let p = profile(EncodeOptions {
            nan: *mode,
            ..EncodeOptions::default()
        });
        let got = p.to_vec(&f32::from_bits(*bits)).unwrap();
        assert_eq!(got, *want, "mode {mode:?} bits {bits:08x}");
    }

    // f64 qNaN whose payload cannot shrink stays at full width under Quiet.
    let p = profile(EncodeOptions {
        nan: NanMode::Quiet,
        ..EncodeOptions::default()
    });
    assert_eq!(
        p.to_vec(&f64::from_bits(0x7ff8_0000_0000_0001)).unwrap(),
        hex!("fb7ff8000000000001")
    );
}

#[test]
fn inf_mode_vectors() {
    // Float16 conversion is the default.
    assert_eq!(default_vec(&f64::INFINITY), hex!("f97c00"));
    assert_eq!(default_vec(&f64::NEG_INFINITY), hex!("f9fc00"));
    assert_eq!(default_vec(&f32::INFINITY), hex!("f97c00"));

    let preserve = profile(EncodeOptions {
        inf: InfMode::Preserve,
        ..EncodeOptions::default()
    });
    assert_eq!(preserve.to_vec(&f32::INFINITY).unwrap(), hex!("fa7f800000"));
    assert_eq!(
        preserve.to_vec(&f64::NEG_INFINITY).unwrap(),
        hex!("fbfff0000000000000")
    );
}

#[test]
fn bignum_shortest_uses_native_integers() {
    // Fits u64: plain major type 0.
    assert_eq!(
        default_vec(&u128::from(u64::MAX)),
        hex!("1bffffffffffffffff")
    );
    // 2^64: one above, needs tag 2.
    assert_eq!(
        default_vec(&(1u128 << 64)),
        hex!("c249010000000000000000")
    );
    // -2^64 is the most negative native integer.
    assert_eq!(
        default_vec(&-(1i128 << 64)),
        hex!("3bffffffffffffffff")
    );
    // One below needs tag 3 with content 2^64.
    assert_eq!(
        default_vec(&(-(1i128 << 64) - 1)),
        hex!("c349010000000000000000")
    );
}

#[test]
fn bignum_tagged_mode_always_tags() {
    let tagged = profile(EncodeOptions {
        bigint: BigIntMode::Tagged,
        ..EncodeOptions::default()
    });
    assert_eq!(
        tagged.to_vec(&polycbor::BigInt::from(255u64)).unwrap(),
        hex!("c241ff")
    );
    assert_eq!(
        tagged.to_vec(&polycbor::BigInt::from(-2i64)).unwrap(),
        hex!("c341 01")
    );
}

#[test]
fn time_mode_vectors() {
    let t = OffsetDateTime::from_unix_timestamp(1_363_896_240).unwrap();
    let t_frac = OffsetDateTime::from_unix_timestamp_nanos(1_363_896_240_500_000_000).unwrap();

    let unix = profile(EncodeOptions::default());
    assert_eq!(unix.to_vec(&t).unwrap(), hex!("1a514b67b0"));

    let unix_tagged = profile(EncodeOptions {
        time_tag: TimeTagMode::Required,
        ..EncodeOptions::default()
    });
    assert_eq!(unix_tagged.to_vec(&t).unwrap(), hex!("c11a514b67b0"));

    let micro = profile(EncodeOptions {
        time: TimeMode::UnixMicro,
        ..EncodeOptions::default()
    });
    assert_eq!(
        micro.to_vec(&t_frac).unwrap(),
        hex!("fb41d452d9ec200000")
    );

    let dynamic = profile(EncodeOptions {
        time: TimeMode::UnixDynamic,
        ..EncodeOptions::default()
    });
    assert_eq!(dynamic.to_vec(&t).unwrap(), hex!("1a514b67b0"));
    assert_eq!(
        dynamic.to_vec(&t_frac).unwrap(),
        hex!("fb41d452d9ec200000")
    );

    let rfc = profile(EncodeOptions {
        time: TimeMode::Rfc3339,
        time_tag: TimeTagMode::Required,
        ..EncodeOptions::default()
    });
    let mut want = hex!("c074").to_vec();
    want.extend_from_slice(b"2013-03-21T20:04:00Z");
    assert_eq!(rfc.to_vec(&t).unwrap(), want);

    // Zero-valued (absent) time encodes as null.
    assert_eq!(
        unix.to_vec(&Option::<OffsetDateTime>::None).unwrap(),
        hex!("f6")
    );
}

#[test]
fn indefinite_length_streaming() {
    let p = profile(EncodeOptions::default());
    let mut e = p.encoder();
    e.begin_array().unwrap();
    e.uint(1).unwrap();
    e.begin_map().unwrap();
    e.text("a").unwrap();
    e.uint(2).unwrap();
    e.end().unwrap();
    e.end().unwrap();
    assert_eq!(e.finish().unwrap(), hex!("9f01bf616102ffff"));

    let forbidding = profile(EncodeOptions::canonical());
    let mut e = forbidding.encoder();
    assert_eq!(e.begin_bytes().unwrap_err(), Error::IndefiniteLength);
}

#[test]
fn raw_value_splices_verbatim() {
    let raw = RawValue(hex!("83010203").to_vec());
    assert_eq!(default_vec(&raw), hex!("83010203"));
    assert_eq!(default_vec(&RawValue::default()), hex!("f6"));

    let nested = vec![RawValue(hex!("01").to_vec()), RawValue(hex!("f5").to_vec())];
    assert_eq!(default_vec(&nested), hex!("8201f5"));
}

#[test]
fn tag_values_respect_tag_policy() {
    let p = profile(EncodeOptions::default());
    let tagged = Value::Tag(1000, Box::new(Value::Uint(5)));
    assert_eq!(p.to_vec(&tagged).unwrap(), hex!("d903e805"));

    let forbidding = profile(EncodeOptions::ctap2());
    assert_eq!(forbidding.to_vec(&tagged).unwrap_err(), Error::TagsForbidden);
    // Bignums need tag 2/3 when out of native range.
    assert_eq!(
        forbidding.to_vec(&(1u128 << 64)).unwrap_err(),
        Error::TagsForbidden
    );
}
