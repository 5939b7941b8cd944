mod log;
mod mapping;
mod stats;
mod table;

use thiserror::Error;

pub use log::{Event, EventLog, Trace};
pub use mapping::{AttributeMapping, TimestampFormat};
pub use stats::{LogStatistics, PathCount, TraceLengthSummary};
pub use table::{Row, Table, Value, filter_by_session_length};

pub type CaseId = String;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("attribute '{attribute}' is not part of the row schema")]
    Schema { attribute: String },
    #[error("row {row} has no value for attribute '{attribute}'")]
    MissingValue { row: usize, attribute: String },
    #[error("row {row} has an unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },
    #[error("trace for case '{case_id}' has no events")]
    EmptyTrace { case_id: CaseId },
    #[error("event of case '{found}' cannot belong to trace '{expected}'")]
    CaseMismatch { expected: CaseId, found: CaseId },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
