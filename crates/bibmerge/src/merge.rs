//! Merge stage: abbreviations first, then the main bibliography.
//!
//! Macro resolution is a single left-to-right pass, so every `@string` the
//! main text uses must already be defined when the parser reaches it.
//! [`merge_sources`] refuses sources whose roles do not match their position.

use crate::error::SourceOrderError;
use crate::models::{MergedText, RawSource, SourceRole};

/// Inserted between the two texts. A newline is whitespace everywhere in the
/// entry grammar, so the last token of one text can never fuse with the first
/// token of the other.
pub const SEPARATOR: &str = "\n";

/// Concatenate the abbreviations text and the main text.
///
/// Either text may be empty.
#[must_use]
pub fn merge(abbrev_text: &str, main_text: &str) -> MergedText {
    MergedText::from_parts(abbrev_text, SEPARATOR, main_text)
}

/// Merge two tagged sources.
///
/// # Errors
///
/// Returns [`SourceOrderError`] unless the roles are `(Abbreviations, Main)`.
pub fn merge_sources(
    abbreviations: &RawSource,
    main: &RawSource,
) -> Result<MergedText, SourceOrderError> {
    for (source, expected) in [(abbreviations, SourceRole::Abbreviations), (main, SourceRole::Main)] {
        if source.role() != expected {
            return Err(SourceOrderError { expected, found: source.role() });
        }
    }

    tracing::debug!(
        abbreviations_bytes = abbreviations.len(),
        main_bytes = main.len(),
        "Merging sources"
    );

    Ok(merge(abbreviations.text(), main.text()))
}
