//! File → reconcile → derive → sink, and single-line inspection.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use kvtrace_core::{JsonSink, Reconciler, Report, ReportSink, Section, TextSink, UnansweredCount};

use crate::config::OutputFormat;

/// Read `path` once and derive the report. The file is closed on return.
pub fn build_report(
    reconciler: &Reconciler,
    path: &Path,
    unanswered: UnansweredCount,
) -> Result<Report> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let data = reconciler
        .accumulate_reader(BufReader::new(file))
        .with_context(|| format!("reconciling {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        lines = data.lines_read,
        orphans = data.orphan_completions,
        "reconciled log"
    );
    Ok(Report::derive(&data, unanswered))
}

pub fn write_report<W: Write>(
    report: &Report,
    format: OutputFormat,
    section: Section,
    out: W,
) -> Result<()> {
    match format {
        OutputFormat::Text => TextSink::new(out).write_report(report, section),
        OutputFormat::Json => JsonSink::new(out).write_report(report, section),
    }
    .context("writing report")
}

/// Describe how a single line is classified and what is extracted from it.
pub fn describe_line(reconciler: &Reconciler, line: &str) -> Result<Vec<(String, String)>> {
    let Some(category) = reconciler.classify(line) else {
        return Ok(vec![("category".into(), "unclassified".into())]);
    };

    let parser = reconciler.parser();
    let mut fields = vec![
        ("category".to_string(), category.to_string()),
        ("mid".to_string(), parser.extract_id(line, 1)?.to_string()),
    ];
    if category.is_timed() {
        let ts = parser.extract_timestamp(line, 1)?;
        fields.push(("timestamp".into(), format!("{ts:?}")));
    }
    Ok(fields)
}
