//! Analyses over an [`EventLog`](webtrace_core::EventLog): directly-follows
//! relation matrices, trace vectorization, Markov clustering of traces and
//! GLOSH outlier detection.

mod clustering;
mod discovery;
mod matrices;
mod outliers;
mod vectorize;

use thiserror::Error;

pub use clustering::{ClusterAssignment, TraceClusterer, cluster, cluster_traces, trace_distance};
pub use discovery::{Arc, Marking, PetriNet, ProcessDiscovery, discover_process};
pub use matrices::{
    Footprint, RelationMatrix, directly_follows_graph, footprint_from_transitions,
    footprint_matrix, heuristic_from_transitions, heuristic_matrix, transition_matrix,
};
pub use outliers::{OutlierDetector, OutlierReport, outlier_detection};
pub use vectorize::{Corpus, SequenceVectors, cosine_similarity, similarity_matrix, vectorize_trace};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] webtrace_config::ConfigError),
    #[error("event log error: {0}")]
    Core(#[from] webtrace_core::CoreError),
    #[error(transparent)]
    Graph(#[from] webtrace_graph_algo::GraphAlgoError),
    #[error("unknown activity: {activity}")]
    UnknownActivity { activity: String },
    #[error("process discovery failed: {0}")]
    Discovery(String),
}

#[cfg(test)]
pub(crate) mod test_support {
    use webtrace_core::{AttributeMapping, EventLog, Row, Table, TimestampFormat, Value};

    /// Log with one event per activity, timestamps increasing across the whole log.
    pub(crate) fn log_of(traces: &[(&str, &[&str])]) -> EventLog {
        let mut rows = Vec::new();
        let mut ts = 0;
        for (case_id, activities) in traces {
            for activity in *activities {
                ts += 1;
                let row: Row = [
                    ("case", Value::from(*case_id)),
                    ("activity", Value::from(*activity)),
                    ("ts", Value::Integer(ts)),
                ]
                .into_iter()
                .collect();
                rows.push(row);
            }
        }
        EventLog::new(
            Table::with_columns(
                vec!["case".to_owned(), "activity".to_owned(), "ts".to_owned()],
                rows,
            ),
            AttributeMapping::new("case", "activity", "ts"),
            TimestampFormat::UnixMillis,
        )
        .expect("log")
    }
}
