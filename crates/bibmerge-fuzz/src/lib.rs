//! Fuzzing library for bibmerge.
//!
//! Targets feed arbitrary input to the entry parser, the LaTeX canonicalizer
//! and the JSON-lines decoder. None of them may panic.
//!
//! # Usage
//!
//! ```bash
//! cd crates/bibmerge-fuzz
//! cargo +nightly fuzz run fuzz_entry_parse -- -max_total_time=60
//! ```

pub use bibmerge::{bibtex, formatters, normalize};
