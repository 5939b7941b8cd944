//! Numeric graph algorithms over dense matrices: Markov clustering and
//! HDBSCAN with GLOSH outlier scores.

mod hdbscan;
mod matrix;
mod mcl;

use thiserror::Error;

pub use hdbscan::{
    CondensedEdge, HdbscanParams, LinkageRow, condense_tree, glosh_scores, minimum_spanning_tree,
    mutual_reachability, outlier_scores, single_linkage,
};
pub use matrix::DenseMatrix;
pub use mcl::{MclParams, MclResult, attractor_clusters, disjoint_partition, markov_cluster, run_mcl};

#[derive(Debug, Error, PartialEq)]
pub enum GraphAlgoError {
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: String, found: String },
}
