//! Agent profile interaction analytics
//!
//! Records profile views and contact-channel clicks against an agent,
//! deduplicating repeats from the same address inside a rolling window, and
//! derives the report shown on the agent dashboard.

pub mod clock;
pub mod error;
pub mod ip_extractor;
pub mod models;
pub mod recorder;
pub mod report;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AnalyticsError, ErrorKind};
pub use ip_extractor::extract_client_ip;
pub use models::{
    AgentAnalytics, Channel, ChannelCounters, Counter, InteractionEvent, InteractionType,
    RequestContext,
};
pub use recorder::{apply_interaction, EventRecorder, RecordOutcome, RecordPolicy};
pub use report::{build_report, AnalyticsReport, AnalyticsReporter, ReportOptions};
