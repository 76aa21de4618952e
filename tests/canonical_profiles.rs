//! The four deterministic preset bundles, and the two key orderings over
//! a mixed-type key set.

use hex_literal::hex;
use polycbor::{cbor, DecodeProfile, EncodeOptions, EncodeProfile, Error, SortMode, Value};

fn profile(opts: EncodeOptions) -> EncodeProfile {
    EncodeProfile::new(opts).unwrap()
}

/// The mixed key set {10, 100, -1, "z", "aa", [100], [-1], false}, each
/// mapped to a small distinguishing value.
fn mixed_key_map() -> Value {
    cbor!({
        "z" => 3,
        [100] => 5,
        10 => 0,
        [(-1)] => 6,
        false => 7,
        "aa" => 4,
        100 => 1,
        (-1) => 2,
    })
}

#[test]
fn length_first_ordering() {
    let p = profile(EncodeOptions {
        sort: SortMode::LengthFirst,
        ..EncodeOptions::default()
    });
    // 10, -1, false (1 byte), then 100, "z", [-1] (2 bytes), then "aa",
    // [100] (3 bytes), ties broken bytewise.
    assert_eq!(
        p.to_vec(&mixed_key_map()).unwrap(),
        hex!("a8 0a00 2002 f407 186401 617a03 812006 62616104 81186405")
    );
}

#[test]
fn bytewise_lexical_ordering() {
    let p = profile(EncodeOptions {
        sort: SortMode::BytewiseLexical,
        ..EncodeOptions::default()
    });
    // Pure bytewise: 10, 100, -1, "z", "aa", [100], [-1], false.
    assert_eq!(
        p.to_vec(&mixed_key_map()).unwrap(),
        hex!("a8 0a00 186401 2002 617a03 62616104 81186405 812006 f407")
    );
}

#[test]
fn insertion_order_is_preserved_without_sorting() {
    let p = profile(EncodeOptions::default());
    let doc = cbor!({ "b" => 1, "a" => 2 });
    assert_eq!(p.to_vec(&doc).unwrap(), hex!("a2616201616102"));
}

#[test]
fn canonical_output_is_insertion_order_independent() {
    let forward = cbor!({ "a" => 1, "bb" => 2, "c" => [1, 2], "dddd" => true });
    let backward = cbor!({ "dddd" => true, "c" => [1, 2], "bb" => 2, "a" => 1 });

    for opts in [
        EncodeOptions::canonical(),
        EncodeOptions::core_deterministic(),
    ] {
        let p = profile(opts);
        assert_eq!(p.to_vec(&forward).unwrap(), p.to_vec(&backward).unwrap());
    }

    let unsorted = profile(EncodeOptions::default());
    assert_ne!(
        unsorted.to_vec(&forward).unwrap(),
        unsorted.to_vec(&backward).unwrap()
    );
}

#[test]
fn canonical_bundles_floats_and_indefinite() {
    let canonical = profile(EncodeOptions::canonical());
    assert_eq!(canonical.to_vec(&1.5f64).unwrap(), hex!("f93e00"));
    assert_eq!(canonical.to_vec(&f64::NAN).unwrap(), hex!("f97e00"));
    assert_eq!(canonical.to_vec(&f64::INFINITY).unwrap(), hex!("f97c00"));
    let mut enc = canonical.encoder();
    assert_eq!(enc.begin_array().unwrap_err(), Error::IndefiniteLength);
}

#[test]
fn ctap2_passes_values_through() {
    let ctap2 = profile(EncodeOptions::ctap2());
    // No float narrowing, NaN bits preserved at original width.
    assert_eq!(ctap2.to_vec(&1.5f32).unwrap(), hex!("fa3fc00000"));
    assert_eq!(ctap2.to_vec(&1.5f64).unwrap(), hex!("fb3ff8000000000000"));
    assert_eq!(
        ctap2
            .to_vec(&f64::from_bits(0x7ff8_0000_0000_0001))
            .unwrap(),
        hex!("fb7ff8000000000001")
    );
    assert_eq!(
        ctap2.to_vec(&f32::NEG_INFINITY).unwrap(),
        hex!("faff800000")
    );
    // Bytewise sort, tags and indefinite lengths forbidden.
    let doc = cbor!({ "b" => 1, "a" => 2 });
    assert_eq!(ctap2.to_vec(&doc).unwrap(), hex!("a2616102616201"));
    assert_eq!(
        ctap2
            .to_vec(&Value::Tag(42, Box::new(Value::Null)))
            .unwrap_err(),
        Error::TagsForbidden
    );
}

#[test]
fn preferred_unsorted_allows_streaming() {
    let p = profile(EncodeOptions::preferred_unsorted());
    assert_eq!(p.to_vec(&1.5f64).unwrap(), hex!("f93e00"));
    let mut enc = p.encoder();
    enc.begin_array().unwrap();
    enc.f64(1.5).unwrap();
    enc.end().unwrap();
    assert_eq!(enc.finish().unwrap(), hex!("9ff93e00ff"));
}

#[test]
fn canonical_round_trips_semantically() {
    let doc = cbor!({
        "temp" => 22.5,
        "ids" => [1, 2, 3],
        "on" => true,
    });
    let p = profile(EncodeOptions::canonical());
    let bytes = p.to_vec(&doc).unwrap();
    let back = DecodeProfile::default().decode_value(&bytes).unwrap();
    let Value::Map(entries) = back else {
        panic!("not a map")
    };
    // Sorted length-first: "on" < "ids" < "temp".
    assert_eq!(entries[0].0, Value::Text("on".into()));
    assert_eq!(entries[1].0, Value::Text("ids".into()));
    assert_eq!(entries[2].0, Value::Text("temp".into()));
    // 22.5 narrowed to float16 and widened back without loss.
    let Value::Float(f) = &entries[2].1 else {
        panic!("not a float")
    };
    assert_eq!(f.value(), 22.5);
}
