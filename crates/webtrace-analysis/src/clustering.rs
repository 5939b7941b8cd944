use std::collections::HashMap;
use std::path::{Path, PathBuf};

use webtrace_config::{ClusteringConfig, load_workspace_config};
use webtrace_core::{CaseId, EventLog, Trace};
use webtrace_graph_algo::{DenseMatrix, MclParams, markov_cluster};

use crate::AnalysisError;
use crate::vectorize::{Corpus, similarity_matrix, vectorize_trace};

/// Case id to cluster id, plus the partition of trace indices it came from.
/// Cluster ids are 1-based and follow the partition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterAssignment {
    case_ids: Vec<CaseId>,
    partition: Vec<Vec<usize>>,
    case_to_cluster: HashMap<CaseId, u32>,
}

impl ClusterAssignment {
    /// `partition` holds indices into `case_ids`; out-of-range indices are ignored.
    pub fn from_partition(case_ids: Vec<CaseId>, partition: Vec<Vec<usize>>) -> Self {
        let mut case_to_cluster = HashMap::with_capacity(case_ids.len());
        for (position, members) in partition.iter().enumerate() {
            let cluster = position as u32 + 1;
            for member in members {
                if let Some(case_id) = case_ids.get(*member) {
                    case_to_cluster.insert(case_id.clone(), cluster);
                }
            }
        }
        Self {
            case_ids,
            partition,
            case_to_cluster,
        }
    }

    pub fn cluster_of(&self, case_id: &str) -> Option<u32> {
        self.case_to_cluster.get(case_id).copied()
    }

    pub fn case_to_cluster(&self) -> &HashMap<CaseId, u32> {
        &self.case_to_cluster
    }

    pub fn partition(&self) -> &[Vec<usize>] {
        &self.partition
    }

    pub fn cluster_count(&self) -> usize {
        self.partition.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partition.is_empty()
    }

    pub fn members(&self, cluster: u32) -> Vec<&str> {
        let Some(indices) = (cluster as usize)
            .checked_sub(1)
            .and_then(|position| self.partition.get(position))
        else {
            return Vec::new();
        };
        indices
            .iter()
            .filter_map(|index| self.case_ids.get(*index).map(String::as_str))
            .collect()
    }

    /// `(cluster id, number of cases)` for every cluster.
    pub fn sizes(&self) -> Vec<(u32, usize)> {
        self.partition
            .iter()
            .enumerate()
            .map(|(position, members)| (position as u32 + 1, members.len()))
            .collect()
    }

    /// Activity frequencies over the traces of one cluster, most frequent first.
    pub fn activity_counts<'a>(
        &self,
        traces: impl IntoIterator<Item = &'a Trace>,
        cluster: u32,
    ) -> Vec<(String, usize)> {
        let mut order = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for trace in traces {
            if self.cluster_of(trace.id()) != Some(cluster) {
                continue;
            }
            for event in trace {
                let count = counts.entry(event.activity.as_str()).or_insert_with(|| {
                    order.push(event.activity.as_str());
                    0
                });
                *count += 1;
            }
        }
        let mut histogram: Vec<(String, usize)> = order
            .into_iter()
            .map(|activity| (activity.to_owned(), counts[activity]))
            .collect();
        histogram.sort_by(|left, right| right.1.cmp(&left.1));
        histogram
    }
}

/// Markov clustering of a square similarity matrix. Empty input gives an
/// empty partition.
pub fn cluster(
    similarity: &DenseMatrix,
    expansion: u32,
    inflation: f64,
) -> Result<Vec<Vec<usize>>, AnalysisError> {
    Ok(markov_cluster(
        similarity,
        &MclParams::new(expansion, inflation),
    )?)
}

/// Vectorizes the traces, builds their cosine similarity and partitions it.
pub fn cluster_traces(
    traces: &[&Trace],
    params: &MclParams,
) -> Result<ClusterAssignment, AnalysisError> {
    params.validate()?;
    let case_ids: Vec<CaseId> = traces.iter().map(|trace| trace.id().to_owned()).collect();
    if traces.is_empty() {
        return Ok(ClusterAssignment::from_partition(case_ids, Vec::new()));
    }

    let corpus = Corpus::build(traces.iter().copied());
    let similarity = similarity_matrix(traces, |trace| vectorize_trace(&corpus, trace));
    let partition = markov_cluster(&similarity, params)?;
    tracing::info!(
        traces = traces.len(),
        activities = corpus.len(),
        clusters = partition.len(),
        "clustered traces"
    );
    Ok(ClusterAssignment::from_partition(case_ids, partition))
}

/// Positional mismatches plus the length difference of two activity sequences.
pub fn trace_distance<S: AsRef<str>>(left: &[S], right: &[S]) -> usize {
    let mismatches = left
        .iter()
        .zip(right)
        .filter(|(a, b)| a.as_ref() != b.as_ref())
        .count();
    mismatches + left.len().abs_diff(right.len())
}

pub struct TraceClusterer {
    workspace: PathBuf,
    config: ClusteringConfig,
}

impl TraceClusterer {
    pub fn new(workspace: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let workspace = workspace.as_ref().to_path_buf();
        let config = load_workspace_config(&workspace)?;
        Ok(Self {
            workspace,
            config: config.clustering,
        })
    }

    pub fn from_config(workspace: impl AsRef<Path>, config: ClusteringConfig) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    pub fn params(&self) -> MclParams {
        MclParams {
            expansion: self.config.expansion,
            inflation: self.config.inflation,
            max_iterations: self.config.max_iterations,
            pruning_threshold: self.config.pruning_threshold,
            ..MclParams::default()
        }
    }

    pub fn cluster(&self, log: &EventLog) -> Result<ClusterAssignment, AnalysisError> {
        let traces: Vec<&Trace> = log.traces().iter().collect();
        cluster_traces(&traces, &self.params())
    }

    /// Clusters the log and writes the assignment into its cluster column.
    pub fn tag(&self, log: &mut EventLog) -> Result<ClusterAssignment, AnalysisError> {
        let assignment = self.cluster(log)?;
        log.set_clusters(assignment.case_to_cluster())?;
        Ok(assignment)
    }
}
