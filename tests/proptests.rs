//! Property tests: round-tripping the generic value model and the
//! determinism guarantee of the canonical presets.

use polycbor::{DecodeProfile, EncodeOptions, EncodeProfile, Float, Value};
use proptest::prelude::*;

fn keys() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<u64>().prop_map(Value::Uint),
        (i64::MIN..0).prop_map(Value::Int),
        "[a-z]{0,12}".prop_map(Value::Text),
        any::<bool>().prop_map(Value::Bool),
    ]
}

fn scalars() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<u64>().prop_map(Value::Uint),
        (i64::MIN..0).prop_map(Value::Int),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
        Just(Value::Undefined),
        proptest::collection::vec(any::<u8>(), 0..24).prop_map(Value::Bytes),
        "[a-z]{0,12}".prop_map(Value::Text),
        any::<f64>()
            .prop_filter("finite", |v| v.is_finite())
            .prop_map(|v| Value::Float(Float::from_f64(v))),
    ]
}

fn values() -> impl Strategy<Value = Value> {
    scalars().prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            proptest::collection::vec((keys(), inner), 0..6).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn default_profile_round_trips_exactly(v in values()) {
        let bytes = polycbor::to_vec(&v).unwrap();
        let back = DecodeProfile::default().decode_value(&bytes).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn canonical_bytes_are_insertion_order_independent(
        entries in proptest::collection::btree_map("[a-z]{1,8}", any::<u32>(), 0..12)
    ) {
        let forward: Vec<(Value, Value)> = entries
            .iter()
            .map(|(k, v)| (Value::Text(k.clone()), Value::Uint(u64::from(*v))))
            .collect();
        let mut backward = forward.clone();
        backward.reverse();

        let profile = EncodeProfile::new(EncodeOptions::canonical()).unwrap();
        let a = profile.to_vec(&Value::Map(forward)).unwrap();
        let b = profile.to_vec(&Value::Map(backward)).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn integers_use_minimal_headers(v in any::<u64>()) {
        let bytes = polycbor::to_vec(&v).unwrap();
        let want_len = match v {
            0..=23 => 1,
            24..=0xff => 2,
            0x100..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        };
        prop_assert_eq!(bytes.len(), want_len);
        let back: u64 = polycbor::from_slice(&bytes).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn shortest_floats_survive_round_trips(v in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        let profile = EncodeProfile::new(EncodeOptions::canonical()).unwrap();
        let bytes = profile.to_vec(&v).unwrap();
        let back = DecodeProfile::default().decode_value(&bytes).unwrap();
        if let Value::Float(f) = back {
            prop_assert_eq!(f.value().to_bits(), v.to_bits());
        } else {
            prop_assert!(false, "not a float");
        }
    }
}
