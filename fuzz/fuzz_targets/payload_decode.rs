#![no_main]

use libfuzzer_sys::fuzz_target;
use wire::{decode_payload, encode_payload, Limits};

fuzz_target!(|data: &[u8]| {
    let limits = Limits::for_testing();
    let Ok(payload) = decode_payload(data, &limits) else {
        return;
    };
    // Accepted payloads re-encode to a stable byte form.
    let bytes = encode_payload(&payload.header, &payload.records).expect("re-encode payload");
    let again = decode_payload(&bytes, &limits).expect("decode re-encoded payload");
    let stable = encode_payload(&again.header, &again.records).expect("re-encode again");
    assert_eq!(stable, bytes);
});
