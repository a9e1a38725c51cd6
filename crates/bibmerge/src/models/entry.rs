//! Parsed and normalized bibliography entries.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Field name → value, in order of first appearance.
pub type Fields = IndexMap<String, String>;

/// One entry as produced by an [`crate::bibtex::EntryParser`].
///
/// Values are raw: macros are expanded and outer delimiters removed, but LaTeX
/// escapes are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Citation key (e.g. `BonehG05`).
    pub key: String,

    /// Lower-case entry kind (e.g. `inproceedings`).
    pub kind: String,

    /// Field values. A field may be absent entirely.
    #[serde(default)]
    pub fields: Fields,
}

impl Entry {
    /// Create an entry with no fields.
    #[must_use]
    pub fn new(key: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { key: key.into(), kind: kind.into(), fields: Fields::new() }
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// An entry whose values are canonical unicode and whose expected fields are all present.
///
/// Only [`crate::normalize::normalize`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedEntry {
    key: String,
    kind: String,
    fields: Fields,
}

impl NormalizedEntry {
    pub(crate) fn new(key: String, kind: String, fields: Fields) -> Self {
        Self { key, kind, fields }
    }

    /// Citation key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lower-case entry kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// All fields, including sentinel-filled expected ones.
    #[must_use]
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Get a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Turn back into a plain entry (e.g. to normalize again).
    #[must_use]
    pub fn into_entry(self) -> Entry {
        Entry { key: self.key, kind: self.kind, fields: self.fields }
    }
}
