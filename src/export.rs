use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::Write;
use tracing::info;

use crate::coverage::{CoverageAggregator, CoverageRange};
use crate::error::Result;

#[derive(Debug, Serialize)]
struct ExportEntry<'a> {
    url: &'a str,
    ranges: &'a [CoverageRange],
}

/// Default export file name, e.g. `Coverage-20261016T142501.json`.
pub fn export_file_name(now: DateTime<Local>) -> String {
    format!("Coverage-{}.json", now.format("%Y%m%dT%H%M%S"))
}

/// Writes every tracked record, regardless of the active filter, as a JSON
/// list of `{url, ranges}`. Returns the number of records written.
pub fn export_report<W: Write>(aggregator: &CoverageAggregator, sink: W) -> Result<usize> {
    let mut entries: Vec<ExportEntry<'_>> = aggregator
        .entries()
        .map(|info| ExportEntry {
            url: info.url(),
            ranges: info.used_ranges(),
        })
        .collect();
    entries.sort_by(|a, b| a.url.cmp(b.url));

    serde_json::to_writer_pretty(sink, &entries)?;

    info!(
        action = "export",
        component = "coverage_export",
        entry_count = entries.len(),
        "Coverage report written"
    );
    Ok(entries.len())
}
