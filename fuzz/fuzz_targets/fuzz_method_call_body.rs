//! Fuzz target: JSON deserialization of a `MethodCall` body.
//!
//! Arbitrary bytes must never panic the decoder, and every call that does
//! decode must have well-formed argument signatures.

#![no_main]

use libfuzzer_sys::fuzz_target;
use virtbus_service::{bus::MethodCall, value::is_known_signature};

fuzz_target!(|data: &[u8]| {
    let Ok(call) = serde_json::from_slice::<MethodCall>(data) else {
        return;
    };
    for arg in &call.args {
        let signature = arg.signature();
        if !signature.starts_with('(') {
            assert!(is_known_signature(&signature), "decoded value has signature '{signature}'");
        }
    }
    let json = serde_json::to_string(&call).expect("decoded call must re-encode");
    let again: MethodCall = serde_json::from_str(&json).expect("re-encoded call must decode");
    assert_eq!(again, call);
});
