#![no_main]

use bibmerge::normalize::canonicalize;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(once) = canonicalize(text) {
            // Canonical output is a fixed point
            assert_eq!(canonicalize(&once).as_deref(), Ok(once.as_str()));
        }
    }
});
