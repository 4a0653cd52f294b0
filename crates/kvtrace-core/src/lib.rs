pub mod error;
pub mod event;
pub mod message;
pub mod parse;
pub mod reconcile;
pub mod report;
pub mod sink;

pub use error::{ReconError, ReconResult};
pub use event::{EventCategory, Marker, MarkerTable};
pub use message::MessageId;
pub use parse::{LineParser, ParseMode, ParseOptions};
pub use reconcile::{OrphanPolicy, PutTiming, Reconciler, ReportData};
pub use report::{Counts, LatencyStats, Report, UnansweredCount};
pub use sink::{JsonSink, ReportSink, Section, TextSink};
