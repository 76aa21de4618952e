#![no_main]

use libfuzzer_sys::fuzz_target;
use polycbor::DecodeProfile;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must never panic, only return errors.
    let _ = DecodeProfile::default().decode_value(data);
});
