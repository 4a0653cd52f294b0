//! Field extraction from a single log line.
//!
//! Two modes are supported:
//! - `fixed`: the timestamp is a fixed character range at the start of the
//!   line and the message id is a fixed-width run after the `mid: ` label.
//! - `tokenized`: the timestamp is the first whitespace token and the id is
//!   the token following the label, whatever its length.

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, ReconResult};
use crate::message::MessageId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    #[default]
    Fixed,
    Tokenized,
}

/// Extraction settings. Character offsets, not byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub mode: ParseMode,
    pub id_label: String,
    /// Id width in fixed mode.
    pub id_len: usize,
    /// Start of the timestamp field (inclusive) in fixed mode.
    pub timestamp_start: usize,
    /// End of the timestamp field (exclusive) in fixed mode.
    pub timestamp_end: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            mode: ParseMode::Fixed,
            id_label: "mid: ".into(),
            id_len: 16,
            timestamp_start: 1,
            timestamp_end: 8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineParser {
    options: ParseOptions,
}

impl LineParser {
    pub fn new(options: ParseOptions) -> ReconResult<Self> {
        if options.id_label.is_empty() {
            return Err(ReconError::Config("id_label must not be empty".into()));
        }
        if options.id_len == 0 {
            return Err(ReconError::Config("id_len must be positive".into()));
        }
        if options.timestamp_end <= options.timestamp_start {
            return Err(ReconError::Config(format!(
                "timestamp field {}..{} is empty",
                options.timestamp_start, options.timestamp_end
            )));
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Extract the message id following the id label. `line_no` is only used
    /// for error reporting.
    pub fn extract_id(&self, line: &str, line_no: usize) -> ReconResult<MessageId> {
        let label = self.options.id_label.as_str();
        let start = line
            .find(label)
            .ok_or(ReconError::MarkerNotFound { line: line_no })?;
        let rest = &line[start + label.len()..];

        match self.options.mode {
            ParseMode::Fixed => {
                let id: String = rest.chars().take(self.options.id_len).collect();
                let found = id.chars().count();
                if found < self.options.id_len {
                    return Err(ReconError::TruncatedId {
                        line: line_no,
                        found,
                    });
                }
                Ok(MessageId::new(id))
            }
            ParseMode::Tokenized => {
                let token = rest
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .trim_end_matches([',', ';', ')', ']']);
                if token.is_empty() {
                    return Err(ReconError::TruncatedId {
                        line: line_no,
                        found: 0,
                    });
                }
                Ok(MessageId::from(token))
            }
        }
    }

    pub fn extract_timestamp(&self, line: &str, line_no: usize) -> ReconResult<f64> {
        let field: String = match self.options.mode {
            ParseMode::Fixed => line
                .chars()
                .skip(self.options.timestamp_start)
                .take(self.options.timestamp_end - self.options.timestamp_start)
                .collect(),
            ParseMode::Tokenized => line
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .trim_matches(['[', ']'])
                .to_string(),
        };

        let trimmed = field.trim();
        match trimmed.parse::<f64>() {
            Ok(t) if t.is_finite() => Ok(t),
            _ => Err(ReconError::Timestamp {
                line: line_no,
                field: trimmed.to_string(),
            }),
        }
    }
}
