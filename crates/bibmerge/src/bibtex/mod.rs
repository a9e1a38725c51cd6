//! Entry-format parsing.
//!
//! The pipeline only needs "text in, ordered entries out", expressed as the
//! [`EntryParser`] trait. [`BibtexParser`] implements it for BibTeX:
//!
//! - `@string{name = value}` macros, case-insensitive, resolved left to right
//! - `#` concatenation of braced, quoted, numeric and macro values
//! - `@comment` / `@preamble` blocks skipped
//! - `%` lines and any other text between entries ignored
//! - entries delimited by `{…}` or `(…)`
//! - a line break inside a value, with the whitespace around it, reads as one space
//! - backslashes are plain text to the reader, except that `\"` does not end a
//!   quoted value
//!
//! Values otherwise keep their LaTeX untouched; see [`crate::normalize`] for
//! canonicalization.

mod parser;

use crate::error::MalformedEntryError;
use crate::models::Entry;

/// Converts entry-format text into an ordered entry sequence.
pub trait EntryParser: Send + Sync {
    /// Short format name for logs.
    fn name(&self) -> &'static str;

    /// Parse the whole text. Any structurally invalid entry fails the call;
    /// there is no partial result.
    fn parse(&self, text: &str) -> Result<Vec<Entry>, MalformedEntryError>;
}

/// The twelve month macros every BibTeX style defines.
pub const MONTH_MACROS: [(&str, &str); 12] = [
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

/// BibTeX parser.
#[derive(Debug, Clone)]
pub struct BibtexParser {
    predefined: Vec<(String, String)>,
}

impl BibtexParser {
    /// Parser with the month macros predefined.
    #[must_use]
    pub fn new() -> Self {
        Self {
            predefined: MONTH_MACROS
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect(),
        }
    }

    /// Parser with no predefined macros at all.
    #[must_use]
    pub const fn without_month_macros() -> Self {
        Self { predefined: Vec::new() }
    }

    /// Predefine an extra macro, as if `@string{name = value}` preceded the text.
    #[must_use]
    pub fn with_macro(mut self, name: &str, value: impl Into<String>) -> Self {
        self.predefined.push((name.to_ascii_lowercase(), value.into()));
        self
    }
}

impl Default for BibtexParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryParser for BibtexParser {
    fn name(&self) -> &'static str {
        "bibtex"
    }

    fn parse(&self, text: &str) -> Result<Vec<Entry>, MalformedEntryError> {
        let parser = parser::Reader::new(text, &self.predefined);
        let entries = parser.run()?;
        tracing::debug!(entries = entries.len(), bytes = text.len(), "Parsed BibTeX");
        Ok(entries)
    }
}

/// Parse BibTeX text with the default parser.
pub fn parse(text: &str) -> Result<Vec<Entry>, MalformedEntryError> {
    BibtexParser::new().parse(text)
}
