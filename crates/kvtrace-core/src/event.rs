use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReconError, ReconResult};

// ---------------------------------------------------------------------------
// EventCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    PutRequest,
    PutResponse,
    GetRequest,
    GetResponse,
    Redirect,
    GetFailure,
}

impl EventCategory {
    pub const ALL: [EventCategory; 6] = [
        Self::PutRequest,
        Self::PutResponse,
        Self::GetRequest,
        Self::GetResponse,
        Self::Redirect,
        Self::GetFailure,
    ];

    /// Whether lines of this category carry a timestamp the reconciler reads.
    pub fn is_timed(self) -> bool {
        matches!(self, Self::PutRequest | Self::PutResponse)
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PutRequest => write!(f, "put-request"),
            Self::PutResponse => write!(f, "put-response"),
            Self::GetRequest => write!(f, "get-request"),
            Self::GetResponse => write!(f, "get-response"),
            Self::Redirect => write!(f, "redirect"),
            Self::GetFailure => write!(f, "get-failure"),
        }
    }
}

impl std::str::FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "put-request" => Ok(Self::PutRequest),
            "put-response" => Ok(Self::PutResponse),
            "get-request" => Ok(Self::GetRequest),
            "get-response" => Ok(Self::GetResponse),
            "redirect" => Ok(Self::Redirect),
            "get-failure" => Ok(Self::GetFailure),
            _ => Err(format!("invalid event category: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// MarkerTable
// ---------------------------------------------------------------------------

/// A literal substring that identifies a line's category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub text: String,
    pub category: EventCategory,
}

impl Marker {
    pub fn new(text: impl Into<String>, category: EventCategory) -> Self {
        Self {
            text: text.into(),
            category,
        }
    }
}

/// Ordered marker vocabulary. The first marker contained in a line wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerTable {
    markers: Vec<Marker>,
}

impl MarkerTable {
    pub fn new(markers: Vec<Marker>) -> ReconResult<Self> {
        if markers.is_empty() {
            return Err(ReconError::Config("marker table is empty".into()));
        }
        if let Some(m) = markers.iter().find(|m| m.text.is_empty()) {
            return Err(ReconError::Config(format!(
                "empty marker text for category {}",
                m.category
            )));
        }
        Ok(Self { markers })
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn classify(&self, line: &str) -> Option<EventCategory> {
        self.markers
            .iter()
            .find(|m| line.contains(m.text.as_str()))
            .map(|m| m.category)
    }
}

impl Default for MarkerTable {
    /// Both `completed GET` and `completing GET` count as GET responses; the
    /// harness has logged either spelling.
    fn default() -> Self {
        Self {
            markers: vec![
                Marker::new("executing PUT", EventCategory::PutRequest),
                Marker::new("completed PUT", EventCategory::PutResponse),
                Marker::new("executing GET", EventCategory::GetRequest),
                Marker::new("completed GET", EventCategory::GetResponse),
                Marker::new("completing GET", EventCategory::GetResponse),
                Marker::new("redirecting", EventCategory::Redirect),
                Marker::new("can't find value", EventCategory::GetFailure),
            ],
        }
    }
}
