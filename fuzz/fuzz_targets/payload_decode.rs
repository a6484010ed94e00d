//! Arbitrary bytes must never panic the payload decoder, and anything that
//! decodes must re-encode.

#![no_main]

use libfuzzer_sys::fuzz_target;
use touchline_proto::Payload;

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = Payload::decode(data) {
        let _ = payload.encode().expect("decoded payload re-encodes");
    }
});
