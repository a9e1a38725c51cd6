//! Data model for the merge-parse-normalize pipeline.
//!
//! Values flow `RawSource` → `MergedText` → `Entry` → `NormalizedEntry` →
//! `ProjectedRecord`. Every field value is a plain `String`; absent values are
//! represented by [`EMPTY_VALUE`], never by an `Option`.

mod entry;
mod record;
mod source;

pub use entry::{Entry, Fields, NormalizedEntry};
pub use record::{AuthorStyle, ENTRY_TYPE_FIELD, FieldSelection, FieldSpec, KEY_FIELD, ProjectedRecord};
pub use source::{MergedText, RawSource, SourceRole};

/// Sentinel stored for a declared field the entry does not define.
pub const EMPTY_VALUE: &str = "";
