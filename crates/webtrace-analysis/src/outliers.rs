use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use webtrace_config::{OutlierConfig, load_workspace_config};
use webtrace_core::{CaseId, EventLog, Trace};
use webtrace_graph_algo::{HdbscanParams, outlier_scores};

use crate::AnalysisError;
use crate::vectorize::{Corpus, SequenceVectors};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutlierReport {
    /// GLOSH score per case, in trace order.
    pub scores: Vec<(CaseId, f64)>,
    pub threshold: f64,
    /// Flagged cases with their raw activity sequence.
    pub outliers: BTreeMap<CaseId, Vec<String>>,
}

impl OutlierReport {
    pub fn is_outlier(&self, case_id: &str) -> bool {
        self.outliers.contains_key(case_id)
    }

    pub fn score_of(&self, case_id: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|(candidate, _)| candidate == case_id)
            .map(|(_, score)| *score)
    }
}

/// Scores the padded sequence vectors and flags every trace scoring strictly
/// above `threshold`.
pub fn outlier_detection(
    vectors: &SequenceVectors,
    min_cluster_size: usize,
    min_samples: usize,
    threshold: f64,
) -> Result<OutlierReport, AnalysisError> {
    let params = HdbscanParams {
        min_cluster_size,
        min_samples,
    };
    let scores = outlier_scores(&vectors.padded(), &params)?;

    let mut report = OutlierReport {
        threshold,
        ..OutlierReport::default()
    };
    for ((case_id, activities), score) in vectors
        .case_ids
        .iter()
        .zip(&vectors.activities)
        .zip(scores)
    {
        if score > threshold {
            report.outliers.insert(case_id.clone(), activities.clone());
        }
        report.scores.push((case_id.clone(), score));
    }
    tracing::info!(
        traces = vectors.len(),
        outliers = report.outliers.len(),
        threshold,
        "scored trace outliers"
    );
    Ok(report)
}

pub struct OutlierDetector {
    workspace: PathBuf,
    config: OutlierConfig,
}

impl OutlierDetector {
    pub fn new(workspace: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let workspace = workspace.as_ref().to_path_buf();
        let config = load_workspace_config(&workspace)?;
        Ok(Self {
            workspace,
            config: config.outliers,
        })
    }

    pub fn from_config(workspace: impl AsRef<Path>, config: OutlierConfig) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn config(&self) -> &OutlierConfig {
        &self.config
    }

    pub fn detect(&self, log: &EventLog) -> Result<OutlierReport, AnalysisError> {
        let traces: Vec<&Trace> = log.traces().iter().collect();
        let corpus = Corpus::build(traces.iter().copied());
        let vectors = SequenceVectors::build(&corpus, &traces);
        outlier_detection(
            &vectors,
            self.config.min_cluster_size,
            self.config.min_samples,
            self.config.threshold,
        )
    }
}
