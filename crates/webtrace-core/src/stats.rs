use serde::Serialize;

use crate::log::EventLog;
use crate::{CaseId, CoreError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceLengthSummary {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathCount {
    pub path: String,
    pub count: usize,
}

/// Descriptive numbers about a log: sizes, trace lengths and the most
/// requested paths.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogStatistics {
    pub row_count: usize,
    pub case_count: usize,
    pub activity_count: usize,
    pub trace_length: Option<TraceLengthSummary>,
    pub longest_traces: Vec<(CaseId, usize)>,
    pub distinct_paths: usize,
    pub top_paths: Vec<PathCount>,
}

impl LogStatistics {
    pub fn compute(log: &EventLog, path_attr: Option<&str>, top_n: usize) -> Result<Self, CoreError> {
        let traces = log.traces();

        let trace_length = if traces.is_empty() {
            None
        } else {
            let lengths = traces.iter().map(|trace| trace.len());
            let total: usize = lengths.clone().sum();
            Some(TraceLengthSummary {
                min: lengths.clone().min().unwrap_or(0),
                max: lengths.max().unwrap_or(0),
                mean: total as f64 / traces.len() as f64,
            })
        };

        let mut longest_traces: Vec<(CaseId, usize)> = traces
            .iter()
            .map(|trace| (trace.id().to_owned(), trace.len()))
            .collect();
        longest_traces.sort_by(|left, right| right.1.cmp(&left.1));
        longest_traces.truncate(top_n);

        let (distinct_paths, top_paths) = match path_attr {
            Some(attr) => {
                log.table().require_column(attr)?;
                let counts = log.table().value_counts(attr);
                let distinct = counts.len();
                let top = counts
                    .into_iter()
                    .take(top_n)
                    .map(|(path, count)| PathCount { path, count })
                    .collect();
                (distinct, top)
            }
            None => (0, Vec::new()),
        };

        Ok(Self {
            row_count: log.len(),
            case_count: traces.len(),
            activity_count: log.unique_activities().len(),
            trace_length,
            longest_traces,
            distinct_paths,
            top_paths,
        })
    }
}
