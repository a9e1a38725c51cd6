//! Field selection and the projected output record.

use std::str::FromStr;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::Entry;
use crate::config::fields;
use crate::error::InvalidFieldSpecError;

/// Output name of the citation key. Always emitted, always first.
pub const KEY_FIELD: &str = "key";

/// Pseudo-field that projects the entry kind.
pub const ENTRY_TYPE_FIELD: &str = "entrytype";

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_:.+/-]*$").expect("valid field name regex"));

/// Ordered, validated list of declared output fields.
///
/// `key` is implicit and never stored; listing it once is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldSpec {
    names: Vec<String>,
}

impl FieldSpec {
    /// Validate a list of field names.
    ///
    /// Names are trimmed and lower-cased. Fails on an empty list, a repeated
    /// name, or a name that is not a field identifier.
    pub fn new<I, S>(names: I) -> Result<Self, InvalidFieldSpecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut declared: Vec<String> = Vec::new();
        let mut seen_key = false;
        let mut any = false;

        for raw in names {
            any = true;
            let name = raw.as_ref().trim().to_ascii_lowercase();

            if !FIELD_NAME.is_match(&name) {
                return Err(InvalidFieldSpecError::InvalidName(raw.as_ref().to_string()));
            }

            if name == KEY_FIELD {
                if seen_key {
                    return Err(InvalidFieldSpecError::Duplicate(name));
                }
                seen_key = true;
                continue;
            }

            if declared.contains(&name) {
                return Err(InvalidFieldSpecError::Duplicate(name));
            }
            declared.push(name);
        }

        if !any {
            return Err(InvalidFieldSpecError::Empty);
        }

        Ok(Self { names: declared })
    }

    /// Parse a comma-separated list such as `"title, author"`.
    pub fn parse(list: &str) -> Result<Self, InvalidFieldSpecError> {
        Self::new(list.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// Build from names taken from parsed entries. Skips validation, drops repeats.
    pub(crate) fn derived(names: impl IntoIterator<Item = String>) -> Self {
        let mut declared: Vec<String> = Vec::new();
        for name in names {
            if name != KEY_FIELD && !declared.contains(&name) {
                declared.push(name);
            }
        }
        Self { names: declared }
    }

    /// Declared fields in output order (without `key`).
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Declared fields that are real entry fields (pseudo-fields excluded).
    pub fn expected_fields(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str).filter(|n| *n != ENTRY_TYPE_FIELD)
    }

    /// Whether a field is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        name == KEY_FIELD || self.names.iter().any(|n| n == name)
    }

    /// Number of fields in every projected record, `key` included.
    #[must_use]
    pub fn record_width(&self) -> usize {
        self.names.len() + 1
    }
}

impl FromStr for FieldSpec {
    type Err = InvalidFieldSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Which fields end up in the output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldSelection {
    /// Every field seen in any entry, preceded by `entrytype`.
    #[default]
    All,
    /// An explicit list.
    Named(FieldSpec),
}

impl FieldSelection {
    /// Fix the declared field list for a parsed entry sequence.
    #[must_use]
    pub fn resolve(&self, entries: &[Entry]) -> FieldSpec {
        match self {
            Self::Named(spec) => spec.clone(),
            Self::All => FieldSpec::derived(
                std::iter::once(ENTRY_TYPE_FIELD.to_string())
                    .chain(entries.iter().flat_map(|e| e.fields.keys().cloned())),
            ),
        }
    }
}

impl FromStr for FieldSelection {
    type Err = InvalidFieldSpecError;

    /// Accepts `all`/`*`, a preset name (`minimal`, `standard`), or a comma-separated list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "*" => Ok(Self::All),
            "minimal" => FieldSpec::new(fields::MINIMAL).map(Self::Named),
            "standard" => FieldSpec::new(fields::STANDARD).map(Self::Named),
            _ => FieldSpec::parse(s).map(Self::Named),
        }
    }
}

/// How multi-valued name fields are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AuthorStyle {
    /// Keep the entry format's own `A and B` text.
    #[default]
    Raw,
    /// `A; B`
    Semicolon,
}

/// One output record: the key plus exactly the declared fields, all strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedRecord {
    key: String,
    fields: IndexMap<String, String>,
}

impl ProjectedRecord {
    pub(crate) fn new(key: String, fields: IndexMap<String, String>) -> Self {
        Self { key, fields }
    }

    /// Primary identifier (citation key).
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Declared fields in output order (without `key`).
    #[must_use]
    pub const fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    /// Get a value by output name, `key` included.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        if name == KEY_FIELD {
            Some(&self.key)
        } else {
            self.fields.get(name).map(String::as_str)
        }
    }

    /// Number of output fields, `key` included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len() + 1
    }

    /// Always false: a record carries at least its key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Serialize for ProjectedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        map.serialize_entry(KEY_FIELD, &self.key)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProjectedRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = IndexMap::<String, String>::deserialize(deserializer)?;
        let key =
            fields.shift_remove(KEY_FIELD).ok_or_else(|| de::Error::missing_field(KEY_FIELD))?;
        Ok(Self { key, fields })
    }
}
