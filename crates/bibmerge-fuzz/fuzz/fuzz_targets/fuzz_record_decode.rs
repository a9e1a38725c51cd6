#![no_main]

use bibmerge::formatters::{decode_line, encode_record};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        if let Ok(record) = decode_line(line) {
            // Anything that decodes re-encodes and decodes to the same record
            let encoded = encode_record(&record).unwrap();
            assert_eq!(decode_line(&encoded).unwrap(), record);
        }
    }
});
