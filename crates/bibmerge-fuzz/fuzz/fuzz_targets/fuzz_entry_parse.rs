#![no_main]

use bibmerge::bibtex::{BibtexParser, EntryParser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Must return Ok or a located error, never panic
        if let Err(e) = BibtexParser::new().parse(text) {
            assert!(e.line >= 1 && e.column >= 1);
        }
    }
});
