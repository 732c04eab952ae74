//! Fuzz target: `ObjectPath` validation.
//!
//! Accepted paths must round-trip through `Display`, and domain paths must
//! map back to the UUID they were derived from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use virtbus_core::ObjectPath;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(path) = ObjectPath::new(text) else {
        return;
    };
    assert_eq!(path.to_string(), text);
    assert!(!path.as_str().contains("//"), "empty element accepted: {text}");
    if let Some(uuid) = path.domain_uuid() {
        assert_eq!(ObjectPath::for_domain(uuid), path);
    }
});
