//! Projection: normalized entries onto the declared field list.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::InvalidFieldSpecError;
use crate::models::{
    AuthorStyle, EMPTY_VALUE, ENTRY_TYPE_FIELD, FieldSpec, NormalizedEntry, ProjectedRecord,
};

/// Name-list fields that [`AuthorStyle`] applies to.
const NAME_LIST_FIELDS: [&str; 2] = ["author", "editor"];

/// Map each entry to a record carrying `key` plus exactly the declared fields.
///
/// Every record has [`FieldSpec::record_width`] fields; an entry without a
/// declared field gets [`EMPTY_VALUE`] for it.
#[must_use]
pub fn project(
    entries: &[NormalizedEntry],
    spec: &FieldSpec,
    authors: AuthorStyle,
) -> Vec<ProjectedRecord> {
    entries.iter().map(|entry| project_entry(entry, spec, authors)).collect()
}

/// [`project`] with an unvalidated field list and raw author lists.
///
/// # Errors
///
/// Returns [`InvalidFieldSpecError`] if `names` is empty or has duplicates.
pub fn project_fields<S: AsRef<str>>(
    entries: &[NormalizedEntry],
    names: &[S],
) -> Result<Vec<ProjectedRecord>, InvalidFieldSpecError> {
    let spec = FieldSpec::new(names)?;
    Ok(project(entries, &spec, AuthorStyle::Raw))
}

fn project_entry(entry: &NormalizedEntry, spec: &FieldSpec, authors: AuthorStyle) -> ProjectedRecord {
    let mut fields = IndexMap::with_capacity(spec.names().len());

    for name in spec.names() {
        let value = if name == ENTRY_TYPE_FIELD {
            entry.kind().to_string()
        } else {
            match entry.get(name) {
                Some(value) if NAME_LIST_FIELDS.contains(&name.as_str()) => {
                    format_names(value, authors)
                }
                Some(value) => value.to_string(),
                None => EMPTY_VALUE.to_string(),
            }
        };
        fields.insert(name.clone(), value);
    }

    ProjectedRecord::new(entry.key().to_string(), fields)
}

fn format_names(value: &str, style: AuthorStyle) -> String {
    match style {
        AuthorStyle::Raw => value.to_string(),
        AuthorStyle::Semicolon => split_names(value).join("; "),
    }
}

/// Separator between names in a BibTeX name list.
static NAME_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+and\s+").expect("valid name separator regex"));

/// Split on `and` between whitespace outside braces, so `{Barnes and Noble}`
/// stays one name.
fn split_names(value: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut start = 0;
    let mut scanned = 0;
    let mut depth = 0usize;

    for separator in NAME_SEPARATOR.find_iter(value) {
        depth = value[scanned..separator.start()].chars().fold(depth, |depth, c| match c {
            '{' => depth + 1,
            '}' => depth.saturating_sub(1),
            _ => depth,
        });
        scanned = separator.start();
        if depth == 0 {
            names.push(value[start..separator.start()].trim());
            start = separator.end();
        }
    }
    names.push(value[start..].trim());

    names.retain(|n| !n.is_empty());
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;
    use crate::normalize::normalize;

    fn entries() -> Vec<NormalizedEntry> {
        let raw = vec![
            Entry::new("BonehG05", "inproceedings")
                .with_field("title", "A Scheme")
                .with_field("author", "D. Boneh and S. Gorbunov")
                .with_field("year", "2005"),
            Entry::new("Lonely", "misc").with_field("note", "n"),
        ];
        normalize(raw, &FieldSpec::new(["title"]).unwrap()).entries
    }

    #[test]
    fn test_project_emits_exactly_declared_fields() {
        let spec = FieldSpec::new(["title", "year"]).unwrap();
        let records = project(&entries(), &spec, AuthorStyle::Raw);

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.len(), spec.record_width());
        }
        assert_eq!(records[0].get("year"), Some("2005"));
        assert_eq!(records[1].get("year"), Some(EMPTY_VALUE));
        assert_eq!(records[1].get("note"), None);
    }

    #[test]
    fn test_project_entrytype_pseudo_field() {
        let spec = FieldSpec::new(["entrytype"]).unwrap();
        let records = project(&entries(), &spec, AuthorStyle::Raw);
        assert_eq!(records[0].get("entrytype"), Some("inproceedings"));
        assert_eq!(records[1].get("entrytype"), Some("misc"));
    }

    #[test]
    fn test_project_semicolon_authors() {
        let spec = FieldSpec::new(["author"]).unwrap();
        let records = project(&entries(), &spec, AuthorStyle::Semicolon);
        assert_eq!(records[0].get("author"), Some("D. Boneh; S. Gorbunov"));
    }

    #[test]
    fn test_split_names_respects_braces() {
        assert_eq!(
            split_names("{Barnes and Noble} and J. Doe"),
            ["{Barnes and Noble}", "J. Doe"]
        );
        assert_eq!(split_names("Alexandra Sandy"), ["Alexandra Sandy"]);
        assert!(split_names("").is_empty());
    }

    #[test]
    fn test_split_names_on_any_whitespace() {
        assert_eq!(
            split_names("D. Boneh and\n  S. Gorbunov and\tJ. Doe"),
            ["D. Boneh", "S. Gorbunov", "J. Doe"]
        );
        assert_eq!(split_names("Anderson and  Sandberg"), ["Anderson", "Sandberg"]);
        assert_eq!(split_names("{A and\nB}\nand C"), ["{A and\nB}", "C"]);
    }

    #[test]
    fn test_project_fields_validates() {
        assert!(project_fields::<&str>(&entries(), &[]).is_err());
        assert!(project_fields(&entries(), &["title", "title"]).is_err());

        let records = project_fields(&entries(), &["key", "title"]).unwrap();
        assert_eq!(records[0].len(), 2);
        assert_eq!(records[0].key(), "BonehG05");
    }
}
