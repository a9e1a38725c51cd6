//! Normalization: canonical unicode values, expected fields always present.

pub mod latex;

use serde::Serialize;

pub use latex::{UnknownSequence, canonicalize};

use crate::models::{EMPTY_VALUE, Entry, FieldSpec, NormalizedEntry};

/// A value whose escapes could not all be resolved. The raw value was kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalizationMiss {
    /// Entry key.
    pub key: String,
    /// Field name.
    pub field: String,
    /// First unresolved sequence.
    pub sequence: String,
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Entries in input order.
    pub entries: Vec<NormalizedEntry>,
    /// Values left raw, in the order they were met.
    pub misses: Vec<CanonicalizationMiss>,
}

/// Canonicalize every value and fill absent expected fields with [`EMPTY_VALUE`].
///
/// Never fails: an unresolvable value is kept as-is and reported in
/// [`Normalized::misses`]. Fields outside `expected` pass through canonicalized.
#[must_use]
pub fn normalize(entries: Vec<Entry>, expected: &FieldSpec) -> Normalized {
    let mut out = Normalized { entries: Vec::with_capacity(entries.len()), misses: Vec::new() };

    for entry in entries {
        let Entry { key, kind, mut fields } = entry;

        for (field, value) in &mut fields {
            match canonicalize(value) {
                Ok(canonical) => *value = canonical,
                Err(miss) => {
                    tracing::warn!(
                        key = %key,
                        field = %field,
                        sequence = %miss.sequence,
                        "Unresolved escape, keeping raw value"
                    );
                    out.misses.push(CanonicalizationMiss {
                        key: key.clone(),
                        field: field.clone(),
                        sequence: miss.sequence,
                    });
                }
            }
        }

        for name in expected.expected_fields() {
            if !fields.contains_key(name) {
                fields.insert(name.to_string(), EMPTY_VALUE.to_string());
            }
        }

        out.entries.push(NormalizedEntry::new(key, kind, fields));
    }

    if !out.misses.is_empty() {
        tracing::info!(misses = out.misses.len(), "Some values kept their raw LaTeX");
    }

    out
}
