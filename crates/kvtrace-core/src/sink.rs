//! Report output. Everything that writes lives behind [`ReportSink`], so the
//! derivation stays pure and tests can render into a `Vec<u8>`.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::ReconResult;
use crate::message::MessageId;
use crate::report::{Counts, LatencyStats, Report};

/// Which part of the report to emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    All,
    /// Counts, unanswered and repeated sets, GET failures.
    Failures,
    /// PUT latency and redirects.
    Times,
}

impl Section {
    fn failures(self) -> bool {
        matches!(self, Self::All | Self::Failures)
    }

    fn times(self) -> bool {
        matches!(self, Self::All | Self::Times)
    }
}

pub trait ReportSink {
    fn write_report(&mut self, report: &Report, section: Section) -> ReconResult<()>;
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_failures(&mut self, report: &Report) -> ReconResult<()> {
        let c = &report.counts;
        writeln!(
            self.out,
            "GETs: {} requests, {} responses ({} unanswered)",
            c.get_requests, c.get_responses, c.unanswered_gets
        )?;
        writeln!(
            self.out,
            "PUTs: {} requests, {} responses ({} unanswered)",
            c.put_requests, c.put_responses, c.unanswered_puts
        )?;
        writeln!(self.out, "unanswered GETs: {}", fmt_set(&report.unanswered_gets))?;
        writeln!(self.out, "unanswered PUTs: {}", fmt_set(&report.unanswered_puts))?;
        writeln!(self.out, "repeated GETs: {}", fmt_set(&report.repeated_gets))?;
        writeln!(self.out, "repeated PUTs: {}", fmt_set(&report.repeated_puts))?;
        if !report.get_failures.is_empty() {
            writeln!(
                self.out,
                "GET failures: {} {}",
                c.get_failures,
                fmt_list(&report.get_failures)
            )?;
        }
        Ok(())
    }

    fn write_times(&mut self, report: &Report) -> ReconResult<()> {
        match &report.latency {
            Some(stats) => writeln!(
                self.out,
                "{} puts (total: {}, max: {:?}, min: {:?})",
                report.put_ids, report.total_puts, stats.max, stats.min
            )?,
            None => writeln!(
                self.out,
                "{} puts (total: {}, no completed PUTs)",
                report.put_ids, report.total_puts
            )?,
        }
        if report.orphan_completions > 0 {
            writeln!(
                self.out,
                "skipped completions: {}",
                report.orphan_completions
            )?;
        }
        writeln!(self.out, "redirects: {}", fmt_list(&report.redirects))?;
        match &report.latency {
            Some(stats) => writeln!(self.out, "median latency: {:?}", stats.median)?,
            None => writeln!(self.out, "median latency: n/a")?,
        }
        Ok(())
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn write_report(&mut self, report: &Report, section: Section) -> ReconResult<()> {
        if section.failures() {
            self.write_failures(report)?;
        }
        if section.times() {
            self.write_times(report)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

fn join<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_set(ids: &BTreeSet<MessageId>) -> String {
    format!("{{{}}}", join(ids))
}

fn fmt_list(ids: &[MessageId]) -> String {
    format!("[{}]", join(ids))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[derive(Serialize)]
struct FailuresView<'a> {
    counts: &'a Counts,
    unanswered_gets: &'a BTreeSet<MessageId>,
    unanswered_puts: &'a BTreeSet<MessageId>,
    repeated_gets: &'a BTreeSet<MessageId>,
    repeated_puts: &'a BTreeSet<MessageId>,
    get_failures: &'a [MessageId],
}

#[derive(Serialize)]
struct TimesView<'a> {
    put_ids: usize,
    total_puts: usize,
    orphan_completions: usize,
    latencies: &'a [f64],
    latency: Option<&'a LatencyStats>,
    redirects: &'a [MessageId],
}

#[derive(Serialize)]
struct JsonView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    failures: Option<FailuresView<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    times: Option<TimesView<'a>>,
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn write_report(&mut self, report: &Report, section: Section) -> ReconResult<()> {
        let view = JsonView {
            failures: section.failures().then(|| FailuresView {
                counts: &report.counts,
                unanswered_gets: &report.unanswered_gets,
                unanswered_puts: &report.unanswered_puts,
                repeated_gets: &report.repeated_gets,
                repeated_puts: &report.repeated_puts,
                get_failures: &report.get_failures,
            }),
            times: section.times().then(|| TimesView {
                put_ids: report.put_ids,
                total_puts: report.total_puts,
                orphan_completions: report.orphan_completions,
                latencies: &report.latencies,
                latency: report.latency.as_ref(),
                redirects: &report.redirects,
            }),
        };
        serde_json::to_writer_pretty(&mut self.out, &view)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
