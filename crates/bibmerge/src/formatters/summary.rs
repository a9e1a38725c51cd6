//! Human-readable run summary.

use crate::pipeline::{RunOutcome, RunReport};
use crate::publish::PublicationStatus;

/// Misses listed individually before the summary switches to a count.
const MAX_LISTED_MISSES: usize = 10;

/// Format a run report as Markdown.
#[must_use]
pub fn format_report_markdown(report: &RunReport) -> String {
    let title = match report.outcome() {
        RunOutcome::Success => "Run succeeded",
        RunOutcome::PartialSuccess => "Run partially succeeded",
    };
    let mut output = format!("# {title}\n\n");

    output.push_str(&format!(
        "**Sources**: abbreviations {} bytes | main {} bytes\n\n",
        report.abbreviations_bytes, report.main_bytes
    ));
    output.push_str(&format!(
        "**Records**: {} ({} entries parsed)\n\n",
        report.records, report.entries
    ));

    let fields = if report.fields.is_empty() {
        "key".to_string()
    } else {
        format!("key, {}", report.fields.join(", "))
    };
    output.push_str(&format!("**Fields**: {fields}\n\n"));

    output.push_str(&format!(
        "**Output**: {} ({} bytes, sha256 {})\n\n",
        report.output.path.display(),
        report.output.bytes,
        report.output.sha256
    ));

    // Publication
    let publication = match &report.publication {
        PublicationStatus::Published { commit_url } => format!("published, {commit_url}"),
        PublicationStatus::Skipped => "skipped (no credential)".to_string(),
        PublicationStatus::Failed { reason } => format!("failed, {reason}"),
    };
    output.push_str(&format!("**Publication**: {publication}\n\n"));

    // Canonicalization misses
    if !report.misses.is_empty() {
        output.push_str(&format!("## Unresolved escapes ({})\n\n", report.misses.len()));
        for miss in report.misses.iter().take(MAX_LISTED_MISSES) {
            output.push_str(&format!("- {} / {}: `{}`\n", miss.key, miss.field, miss.sequence));
        }
        if report.misses.len() > MAX_LISTED_MISSES {
            output.push_str(&format!("- … and {} more\n", report.misses.len() - MAX_LISTED_MISSES));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "_Finished in {:.1}s_\n",
        report.elapsed().num_milliseconds() as f64 / 1000.0
    ));

    output
}

/// Format a run report as pretty JSON.
///
/// # Errors
///
/// Returns error if serialization fails.
pub fn format_report_json(report: &RunReport) -> serde_json::Result<String> {
    let mut value = serde_json::to_value(report)?;
    value["outcome"] = serde_json::to_value(report.outcome())?;
    serde_json::to_string_pretty(&value)
}
