//! Single pass over a log, accumulating ids per category and PUT timings.

use std::collections::BTreeMap;
use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ReconError, ReconResult};
use crate::event::{EventCategory, MarkerTable};
use crate::message::MessageId;
use crate::parse::LineParser;

/// What to do with a `completed PUT` whose id was never issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Abort the run with [`ReconError::UnknownMessage`].
    #[default]
    Fail,
    /// Log a warning, count it and keep going.
    Skip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PutTiming {
    pub issue: Option<f64>,
    pub complete: Option<f64>,
}

impl PutTiming {
    pub fn latency(&self) -> Option<f64> {
        match (self.issue, self.complete) {
            (Some(issue), Some(complete)) => Some(complete - issue),
            _ => None,
        }
    }
}

/// Everything collected from one pass, before any derivation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportData {
    pub put_requests: Vec<MessageId>,
    pub put_responses: Vec<MessageId>,
    pub get_requests: Vec<MessageId>,
    pub get_responses: Vec<MessageId>,
    pub redirects: Vec<MessageId>,
    pub get_failures: Vec<MessageId>,
    /// Ordered by id, not by issue time.
    pub put_timings: BTreeMap<MessageId, PutTiming>,
    /// Number of `executing PUT` lines, re-issues included.
    pub total_puts: usize,
    pub orphan_completions: usize,
    pub lines_read: usize,
    pub lines_classified: usize,
}

impl ReportData {
    pub fn ids(&self, category: EventCategory) -> &[MessageId] {
        match category {
            EventCategory::PutRequest => &self.put_requests,
            EventCategory::PutResponse => &self.put_responses,
            EventCategory::GetRequest => &self.get_requests,
            EventCategory::GetResponse => &self.get_responses,
            EventCategory::Redirect => &self.redirects,
            EventCategory::GetFailure => &self.get_failures,
        }
    }

    fn ids_mut(&mut self, category: EventCategory) -> &mut Vec<MessageId> {
        match category {
            EventCategory::PutRequest => &mut self.put_requests,
            EventCategory::PutResponse => &mut self.put_responses,
            EventCategory::GetRequest => &mut self.get_requests,
            EventCategory::GetResponse => &mut self.get_responses,
            EventCategory::Redirect => &mut self.redirects,
            EventCategory::GetFailure => &mut self.get_failures,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    markers: MarkerTable,
    parser: LineParser,
    on_orphan: OrphanPolicy,
    /// When false, PUT lines are only counted: no timestamps, no timing map.
    timings: bool,
}

impl Reconciler {
    pub fn new(markers: MarkerTable, parser: LineParser, on_orphan: OrphanPolicy) -> Self {
        Self {
            markers,
            parser,
            on_orphan,
            timings: true,
        }
    }

    /// Skip timestamp parsing and timing lookups, so bad timestamps and
    /// orphan completions cannot abort a pass that only needs id counts.
    pub fn without_timings(mut self) -> Self {
        self.timings = false;
        self
    }

    pub fn tracks_timings(&self) -> bool {
        self.timings
    }

    pub fn markers(&self) -> &MarkerTable {
        &self.markers
    }

    pub fn parser(&self) -> &LineParser {
        &self.parser
    }

    pub fn classify(&self, line: &str) -> Option<EventCategory> {
        self.markers.classify(line)
    }

    /// Accumulate over in-memory lines, in order.
    pub fn accumulate<I, S>(&self, lines: I) -> ReconResult<ReportData>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut data = ReportData::default();
        for line in lines {
            self.ingest(&mut data, line.as_ref())?;
        }
        log_summary(&data);
        Ok(data)
    }

    /// Accumulate over a reader. Read and UTF-8 errors abort the pass.
    pub fn accumulate_reader<R: BufRead>(&self, reader: R) -> ReconResult<ReportData> {
        let mut data = ReportData::default();
        for line in reader.lines() {
            self.ingest(&mut data, &line?)?;
        }
        log_summary(&data);
        Ok(data)
    }

    fn ingest(&self, data: &mut ReportData, line: &str) -> ReconResult<()> {
        data.lines_read += 1;
        let line_no = data.lines_read;

        let Some(category) = self.classify(line) else {
            return Ok(());
        };
        data.lines_classified += 1;

        let mid = self.parser.extract_id(line, line_no)?;
        debug!(line = line_no, %category, %mid, "classified");

        match category {
            EventCategory::PutRequest if !self.timings => data.total_puts += 1,
            EventCategory::PutResponse if !self.timings => {}
            EventCategory::PutRequest => {
                let issued = self.parser.extract_timestamp(line, line_no)?;
                data.total_puts += 1;
                let previous = data.put_timings.insert(
                    mid.clone(),
                    PutTiming {
                        issue: Some(issued),
                        complete: None,
                    },
                );
                if previous.is_some() {
                    debug!(line = line_no, %mid, "PUT re-issued, timing reset");
                }
            }
            EventCategory::PutResponse => {
                let completed = self.parser.extract_timestamp(line, line_no)?;
                match data.put_timings.get_mut(&mid) {
                    Some(timing) => {
                        if timing.complete.is_some() {
                            debug!(line = line_no, %mid, "PUT completed again, overwriting");
                        }
                        if timing.issue.is_some_and(|issued| completed < issued) {
                            warn!(line = line_no, %mid, "PUT completed before it was issued");
                        }
                        timing.complete = Some(completed);
                    }
                    None => match self.on_orphan {
                        OrphanPolicy::Fail => {
                            return Err(ReconError::UnknownMessage {
                                line: line_no,
                                mid: mid.to_string(),
                            });
                        }
                        OrphanPolicy::Skip => {
                            warn!(line = line_no, %mid, "completion for unknown PUT, skipping");
                            data.orphan_completions += 1;
                        }
                    },
                }
            }
            EventCategory::GetRequest
            | EventCategory::GetResponse
            | EventCategory::Redirect
            | EventCategory::GetFailure => {}
        }

        data.ids_mut(category).push(mid);
        Ok(())
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(
            MarkerTable::default(),
            LineParser::default(),
            OrphanPolicy::default(),
        )
    }
}

fn log_summary(data: &ReportData) {
    info!(
        lines = data.lines_read,
        classified = data.lines_classified,
        puts = data.total_puts,
        "log pass complete"
    );
}
