//! Struct field resolution end-to-end: attribute handling, embedding
//! promotion and shadowing, positional array mode, and the decode-side
//! matching rules.

use hex_literal::hex;
use polycbor::{
    BigInt, Decode, DecodeOptions, DecodeProfile, DupKeyMode, Encode, EncodeOptions,
    EncodeProfile, Error, UnknownFieldMode,
};

fn canonical() -> EncodeProfile {
    EncodeProfile::new(EncodeOptions::canonical()).unwrap()
}

fn encode<T: Encode>(v: &T) -> Vec<u8> {
    polycbor::to_vec(v).unwrap()
}

fn decode<T: Decode>(data: &[u8]) -> T {
    polycbor::from_slice(data).unwrap()
}

#[derive(Debug, Default, PartialEq, Encode, Decode)]
struct Inner {
    x: u64,
    y: u64,
}

#[derive(Debug, Default, PartialEq, Encode, Decode)]
struct OtherX {
    x: u64,
}

#[test]
fn plain_struct_round_trip() {
    let v = Inner { x: 1, y: 2 };
    let bytes = encode(&v);
    assert_eq!(bytes, hex!("a2617801617902"));
    assert_eq!(decode::<Inner>(&bytes), v);
}

#[test]
fn rename_and_keyasint() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Renamed {
        #[cbor(rename = "id")]
        identifier: u64,
        #[cbor(rename = "1", keyasint)]
        first: u64,
        #[cbor(rename = "-7", keyasint)]
        negative: u64,
    }

    let v = Renamed {
        identifier: 9,
        first: 1,
        negative: 2,
    };
    let bytes = encode(&v);
    // {"id": 9, 1: 1, -7: 2} in declaration order.
    assert_eq!(bytes, hex!("a36269640901012602"));
    assert_eq!(decode::<Renamed>(&bytes), v);
}

#[test]
fn omitempty_is_per_kind() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Omit {
        #[cbor(omitempty)]
        n: u64,
        #[cbor(omitempty)]
        f: f64,
        #[cbor(omitempty)]
        b: bool,
        #[cbor(omitempty)]
        s: String,
        #[cbor(omitempty)]
        v: Vec<u64>,
        #[cbor(omitempty)]
        o: Option<u64>,
        // Bignums are never considered empty.
        #[cbor(omitempty)]
        big: BigInt,
    }

    let empty = Omit::default();
    // Only the bignum survives; zero encodes as integer 0.
    assert_eq!(encode(&empty), hex!("a16362696700"));

    let full = Omit {
        n: 1,
        f: 0.5,
        b: true,
        s: "s".into(),
        v: vec![2],
        o: Some(3),
        big: BigInt::from(4u64),
    };
    let bytes = encode(&full);
    assert_eq!(decode::<Omit>(&bytes), full);
}

#[test]
fn skip_marker_excludes_unconditionally() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Skipped {
        keep: u64,
        #[cbor(skip)]
        gone: u64,
    }

    let bytes = encode(&Skipped { keep: 1, gone: 9 });
    assert_eq!(bytes, hex!("a1646b65657001"));
    // Decoding input that mentions the skipped name leaves it untouched.
    let v: Skipped = decode(&hex!("a2646b65657001 64676f6e6507"));
    assert_eq!(v, Skipped { keep: 1, gone: 0 });
}

#[test]
fn embedding_promotes_fields_breadth_first() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Outer {
        z: u64,
        #[cbor(embed)]
        inner: Inner,
    }

    let v = Outer {
        z: 9,
        inner: Inner { x: 1, y: 2 },
    };
    let bytes = encode(&v);
    // Promoted fields appear as if declared directly: {"z", "x", "y"}.
    assert_eq!(bytes, hex!("a3617a09617801617902"));
    assert_eq!(decode::<Outer>(&bytes), v);
}

#[test]
fn direct_field_shadows_embedded() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Shadow {
        x: u64,
        #[cbor(embed)]
        inner: Inner,
    }

    let v = Shadow {
        x: 7,
        inner: Inner { x: 1, y: 2 },
    };
    let bytes = encode(&v);
    // Direct x wins; Inner's x is hidden, Inner's y is promoted.
    assert_eq!(bytes, hex!("a2617807617902"));

    let back: Shadow = decode(&bytes);
    assert_eq!(back.x, 7);
    assert_eq!(back.inner.x, 0);
    assert_eq!(back.inner.y, 2);
}

#[test]
fn ambiguous_same_depth_fields_are_dropped() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct JustX {
        x: u64,
    }

    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Ambiguous {
        #[cbor(embed)]
        a: OtherX,
        #[cbor(embed)]
        b: JustX,
    }

    // Both embedded structs contribute only the colliding name: nothing
    // survives, so the whole struct encodes as the empty map.
    let v = Ambiguous {
        a: OtherX { x: 1 },
        b: JustX { x: 2 },
    };
    assert_eq!(encode(&v), hex!("a0"));

    // On decode the colliding key matches no field.
    let back: Ambiguous = decode(&hex!("a1617805"));
    assert_eq!(back, Ambiguous::default());
}

#[test]
fn tagged_field_dominates_ambiguity() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct RenamedX {
        #[cbor(rename = "x")]
        value: u64,
    }

    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Dominated {
        #[cbor(embed)]
        a: OtherX,
        #[cbor(embed)]
        b: RenamedX,
    }

    // At depth 1 the renamed "x" dominates the untagged one.
    let v = Dominated {
        a: OtherX { x: 1 },
        b: RenamedX { value: 2 },
    };
    assert_eq!(encode(&v), hex!("a1617802"));

    let back: Dominated = decode(&hex!("a1617805"));
    assert_eq!(back.b.value, 5);
    assert_eq!(back.a.x, 0);
}

#[test]
fn renamed_embedded_struct_is_not_flattened() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Wrapped {
        #[cbor(embed, rename = "inner")]
        inner: Inner,
    }

    let v = Wrapped {
        inner: Inner { x: 1, y: 2 },
    };
    let bytes = encode(&v);
    // {"inner": {"x": 1, "y": 2}}
    assert_eq!(bytes, hex!("a165696e6e6572a2617801617902"));
    assert_eq!(decode::<Wrapped>(&bytes), v);
}

#[test]
fn nil_embedded_pointer_contributes_nothing() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Node {
        v: u64,
        #[cbor(embed)]
        extra: Option<Box<Inner>>,
    }

    let bare = Node {
        v: 5,
        extra: None,
    };
    assert_eq!(encode(&bare), hex!("a1617605"));

    let filled = Node {
        v: 5,
        extra: Some(Box::new(Inner { x: 1, y: 2 })),
    };
    assert_eq!(encode(&filled), hex!("a3617605617801617902"));

    // Decoding only "v" must not allocate the embedded pointer...
    let back: Node = decode(&hex!("a1617605"));
    assert_eq!(back.extra, None);

    // ...but setting a promoted child through it does.
    let back: Node = decode(&hex!("a2617605617103"));
    assert_eq!(back.extra, None, "unknown key must not allocate");
    let back: Node = decode(&hex!("a2617605617803"));
    assert_eq!(back.extra, Some(Box::new(Inner { x: 3, y: 0 })));
}

#[test]
fn toarray_is_positional_and_ignores_omitempty() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    #[cbor(toarray)]
    struct Positional {
        a: u64,
        #[cbor(omitempty)]
        b: u64,
        c: String,
    }

    let v = Positional {
        a: 1,
        b: 0,
        c: "z".into(),
    };
    let bytes = encode(&v);
    // Every declared field, positionally, empty or not.
    assert_eq!(bytes, hex!("8301 00 617a"));
    assert_eq!(decode::<Positional>(&bytes), v);

    // Element count must match the field count exactly.
    let err = polycbor::from_slice::<Positional>(&hex!("820100")).unwrap_err();
    assert!(matches!(
        err,
        Error::UnmarshalType {
            cbor_type: "array",
            rust_type: "Positional",
            ..
        }
    ));
    let err = polycbor::from_slice::<Positional>(&hex!("840100617a07")).unwrap_err();
    assert!(matches!(err, Error::UnmarshalType { .. }));
}

#[test]
fn decode_matches_exact_then_case_insensitive() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Named {
        id: u64,
        name: String,
    }

    let v: Named = decode(&hex!("a262494407644e414d4563616263"));
    assert_eq!(
        v,
        Named {
            id: 7,
            name: "abc".into()
        }
    );
}

#[test]
fn unknown_fields_policy() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Small {
        x: u64,
    }

    // {"zz": 1, "x": 2}
    let input = hex!("a2627a7a01617802");
    let relaxed: Small = decode(&input);
    assert_eq!(relaxed.x, 2);

    let strict = DecodeProfile::new(DecodeOptions {
        unknown_fields: UnknownFieldMode::Error,
        ..DecodeOptions::default()
    })
    .unwrap();
    let err = strict.from_slice::<Small>(&input).unwrap_err();
    assert_eq!(err, Error::UnknownField { index: 0 });
}

#[test]
fn duplicate_struct_keys() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Small {
        x: u64,
    }

    // {"x": 1, "x": 2}
    let input = hex!("a2617801617802");
    // Default: first occurrence wins, the repeat is skipped as unknown.
    let quiet: Small = decode(&input);
    assert_eq!(quiet.x, 1);

    let strict = DecodeProfile::new(DecodeOptions {
        dup_map_key: DupKeyMode::Enforced,
        ..DecodeOptions::default()
    })
    .unwrap();
    let err = strict.from_slice::<Small>(&input).unwrap_err();
    assert_eq!(
        err,
        Error::DupMapKey {
            key: "\"x\"".into(),
            index: 1
        }
    );
}

#[test]
fn field_errors_carry_paths_and_continue() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Two {
        n: u64,
        m: u64,
    }

    // {"n": "oops", "m": 5}: the first field fails, the second still
    // parses, and the first error is the one reported.
    let err = polycbor::from_slice::<Two>(&hex!("a2616e646f6f7073616d05")).unwrap_err();
    assert_eq!(
        err,
        Error::UnmarshalType {
            cbor_type: "UTF-8 text string",
            rust_type: "u64",
            field: Some("Two.n".into())
        }
    );
}

#[test]
fn structs_sort_like_maps_under_canonical_profiles() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Mixed {
        longer: u64,
        z: u64,
        ab: u64,
    }

    let v = Mixed {
        longer: 1,
        z: 2,
        ab: 3,
    };
    // Length-first: "z" (2) < "ab" (3) < "longer" (7).
    assert_eq!(
        canonical().to_vec(&v).unwrap(),
        hex!("a3 617a02 62616203 666c6f6e67657201")
    );
}

#[test]
fn enums_and_tuple_structs_round_trip() {
    #[derive(Debug, PartialEq, Encode, Decode)]
    enum Shape {
        Empty,
        Pair(u64, String),
        Named {
            w: u64,
            #[cbor(rename = "t")]
            tall: u64,
        },
    }

    #[derive(Debug, PartialEq, Encode, Decode)]
    struct Wrapper(u64, bool);

    let unit = Shape::Empty;
    let bytes = encode(&unit);
    assert_eq!(bytes, hex!("a165456d707479f6"));
    assert_eq!(decode::<Shape>(&bytes), unit);

    let pair = Shape::Pair(7, "x".into());
    let bytes = encode(&pair);
    assert_eq!(bytes, hex!("a1645061697282076178"));
    assert_eq!(decode::<Shape>(&bytes), pair);

    let named = Shape::Named { w: 1, tall: 2 };
    let bytes = encode(&named);
    assert_eq!(bytes, hex!("a1654e616d6564a2617701617402"));
    assert_eq!(decode::<Shape>(&bytes), named);

    let w = Wrapper(9, true);
    let bytes = encode(&w);
    assert_eq!(bytes, hex!("8209f5"));
    assert_eq!(decode::<Wrapper>(&bytes), w);
}

#[test]
fn wide_integer_fields() {
    #[derive(Debug, Default, PartialEq, Encode, Decode)]
    struct Wide {
        big: u128,
        signed: i128,
    }

    let v = Wide {
        big: (1u128 << 64) + 5,
        signed: -(1i128 << 70),
    };
    let bytes = encode(&v);
    assert_eq!(decode::<Wide>(&bytes), v);
}
