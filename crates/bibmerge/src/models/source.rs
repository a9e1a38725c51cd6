//! Raw source texts and their merged form.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the two bibliography files a text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// `@string` macro definitions. Must precede the main text.
    Abbreviations,
    /// The entries themselves.
    Main,
}

impl SourceRole {
    /// Lower-case name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abbreviations => "abbreviations",
            Self::Main => "main",
        }
    }
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetched source text tagged with its role. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    role: SourceRole,
    text: String,
}

impl RawSource {
    /// Wrap a fetched text.
    #[must_use]
    pub fn new(role: SourceRole, text: impl Into<String>) -> Self {
        Self { role, text: text.into() }
    }

    /// Role of this source.
    #[must_use]
    pub const fn role(&self) -> SourceRole {
        self.role
    }

    /// Full text as fetched.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Size of the text in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the source is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Abbreviations text followed by the main text.
///
/// Only [`crate::merge::merge`] builds this, so the abbreviations bytes always
/// appear in full before the main bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedText {
    text: String,
    main_offset: usize,
}

impl MergedText {
    pub(crate) fn from_parts(abbreviations: &str, separator: &str, main: &str) -> Self {
        let mut text = String::with_capacity(abbreviations.len() + separator.len() + main.len());
        text.push_str(abbreviations);
        text.push_str(separator);
        let main_offset = text.len();
        text.push_str(main);
        Self { text, main_offset }
    }

    /// The merged text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Byte offset at which the main text begins.
    #[must_use]
    pub const fn main_offset(&self) -> usize {
        self.main_offset
    }

    /// The main part of the merged text.
    #[must_use]
    pub fn main(&self) -> &str {
        &self.text[self.main_offset..]
    }

    /// Total size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the merged text is empty (it never is: the separator is always present).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Consume into the underlying string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

impl AsRef<str> for MergedText {
    fn as_ref(&self) -> &str {
        &self.text
    }
}
