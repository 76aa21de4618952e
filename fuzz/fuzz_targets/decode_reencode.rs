#![no_main]

use libfuzzer_sys::fuzz_target;
use polycbor::{DecodeProfile, EncodeOptions, EncodeProfile};

fuzz_target!(|data: &[u8]| {
    let decode = DecodeProfile::default();
    let Ok(value) = decode.decode_value(data) else {
        return;
    };
    // Anything we accepted must re-encode, and the canonical bytes must
    // decode again to the same canonical bytes (a fixed point).
    let canonical = EncodeProfile::new(EncodeOptions::canonical()).unwrap();
    let Ok(bytes) = canonical.to_vec(&value) else {
        // Indefinite-length input re-encodes as definite; only tag-policy
        // conflicts are impossible here, so this must succeed.
        panic!("re-encode failed");
    };
    let again = decode.decode_value(&bytes).expect("canonical bytes decode");
    let bytes_again = canonical.to_vec(&again).expect("canonical re-encode");
    assert_eq!(bytes, bytes_again);
});
