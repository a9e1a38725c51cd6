//! Output formatting.
//!
//! - [`jsonl`]: the record stream (one JSON object per line)
//! - [`summary`]: the run report for humans or machines

pub mod jsonl;
pub mod summary;

pub use jsonl::{EmitSummary, decode_line, emit, encode_record, write_jsonl};
pub use summary::{format_report_json, format_report_markdown};
