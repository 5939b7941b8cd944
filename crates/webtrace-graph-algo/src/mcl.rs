use std::collections::BTreeSet;

use crate::GraphAlgoError;
use crate::matrix::DenseMatrix;

const CONVERGENCE_RTOL: f64 = 1e-5;
const CONVERGENCE_ATOL: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct MclParams {
    /// Matrix power applied in every expansion step, at least 2.
    pub expansion: u32,
    /// Hadamard power applied in every inflation step, at least 1.
    pub inflation: f64,
    /// Diagonal value forced before the first step; zero keeps the input diagonal.
    pub loop_value: f64,
    pub max_iterations: usize,
    /// Entries below this are dropped after each iteration, except each column's maximum.
    pub pruning_threshold: f64,
}

impl Default for MclParams {
    fn default() -> Self {
        Self {
            expansion: 2,
            inflation: 2.0,
            loop_value: 0.0,
            max_iterations: 100,
            pruning_threshold: 0.001,
        }
    }
}

impl MclParams {
    pub fn new(expansion: u32, inflation: f64) -> Self {
        Self {
            expansion,
            inflation,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GraphAlgoError> {
        if self.expansion < 2 {
            return Err(GraphAlgoError::InvalidParameter {
                name: "expansion",
                message: format!("must be at least 2, got {}", self.expansion),
            });
        }
        if !self.inflation.is_finite() || self.inflation < 1.0 {
            return Err(GraphAlgoError::InvalidParameter {
                name: "inflation",
                message: format!("must be a finite value of at least 1, got {}", self.inflation),
            });
        }
        if self.pruning_threshold < 0.0 {
            return Err(GraphAlgoError::InvalidParameter {
                name: "pruning_threshold",
                message: format!("must not be negative, got {}", self.pruning_threshold),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MclResult {
    pub matrix: DenseMatrix,
    pub iterations: usize,
    pub converged: bool,
}

/// Runs Markov clustering on a square similarity matrix until the flow
/// matrix stops changing. Negative similarities count as no edge.
pub fn run_mcl(similarity: &DenseMatrix, params: &MclParams) -> Result<MclResult, GraphAlgoError> {
    params.validate()?;
    if !similarity.is_square() {
        return Err(GraphAlgoError::DimensionMismatch {
            expected: "square matrix".to_owned(),
            found: format!("{}x{}", similarity.rows(), similarity.cols()),
        });
    }

    let mut matrix = similarity.map(|value| value.max(0.0));
    if params.loop_value > 0.0 {
        for index in 0..matrix.rows() {
            matrix.set(index, index, params.loop_value);
        }
    }
    matrix.normalize_columns();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < params.max_iterations {
        let previous = matrix.clone();
        matrix = matrix.power(params.expansion)?;
        matrix = inflate(&matrix, params.inflation);
        if params.pruning_threshold > 0.0 {
            matrix = prune(&matrix, params.pruning_threshold);
        }
        iterations += 1;
        if matrix.all_close(&previous, CONVERGENCE_RTOL, CONVERGENCE_ATOL) {
            converged = true;
            break;
        }
    }

    tracing::debug!(
        size = matrix.rows(),
        iterations,
        converged,
        "markov clustering finished"
    );
    Ok(MclResult {
        matrix,
        iterations,
        converged,
    })
}

fn inflate(matrix: &DenseMatrix, power: f64) -> DenseMatrix {
    let mut inflated = matrix.map(|value| value.powf(power));
    inflated.normalize_columns();
    inflated
}

fn prune(matrix: &DenseMatrix, threshold: f64) -> DenseMatrix {
    let mut pruned = matrix.map(|value| if value >= threshold { value } else { 0.0 });
    for col in 0..matrix.cols() {
        let mut best_row = 0;
        for row in 1..matrix.rows() {
            if matrix.get(row, col) > matrix.get(best_row, col) {
                best_row = row;
            }
        }
        if matrix.rows() > 0 {
            pruned.set(best_row, col, matrix.get(best_row, col));
        }
    }
    pruned
}

/// Distinct column sets of the attractor rows (non-zero diagonal), sorted.
/// The sets may overlap.
pub fn attractor_clusters(matrix: &DenseMatrix) -> Vec<Vec<usize>> {
    let clusters: BTreeSet<Vec<usize>> = (0..matrix.rows().min(matrix.cols()))
        .filter(|index| matrix.get(*index, *index) > 0.0)
        .map(|attractor| {
            matrix
                .row(attractor)
                .iter()
                .enumerate()
                .filter(|(_, value)| **value > 0.0)
                .map(|(col, _)| col)
                .collect()
        })
        .collect();
    clusters.into_iter().collect()
}

/// Makes clusters disjoint: a node stays in the first cluster that claims it,
/// and nodes no cluster claims become singletons at the end.
pub fn disjoint_partition(clusters: Vec<Vec<usize>>, size: usize) -> Vec<Vec<usize>> {
    let mut claimed = vec![false; size];
    let mut partition = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        let members: Vec<usize> = cluster
            .into_iter()
            .filter(|node| *node < size && !std::mem::replace(&mut claimed[*node], true))
            .collect();
        if !members.is_empty() {
            partition.push(members);
        }
    }
    for (node, is_claimed) in claimed.iter().enumerate() {
        if !is_claimed {
            partition.push(vec![node]);
        }
    }
    partition
}

/// Partition of the similarity matrix indices; empty input yields an empty
/// partition.
pub fn markov_cluster(
    similarity: &DenseMatrix,
    params: &MclParams,
) -> Result<Vec<Vec<usize>>, GraphAlgoError> {
    params.validate()?;
    if similarity.rows() == 0 && similarity.cols() == 0 {
        return Ok(Vec::new());
    }
    let result = run_mcl(similarity, params)?;
    Ok(disjoint_partition(
        attractor_clusters(&result.matrix),
        similarity.rows(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine_block_matrix() -> DenseMatrix {
        let vectors: [[f64; 4]; 6] = [
            [2.0, 1.0, 0.0, 0.0],
            [3.0, 1.0, 0.0, 0.0],
            [2.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 4.0],
            [0.0, 0.0, 1.0, 3.0],
            [0.0, 0.0, 1.0, 4.0],
        ];
        let cosine = |left: &[f64; 4], right: &[f64; 4]| {
            let dot: f64 = left.iter().zip(right).map(|(a, b)| a * b).sum();
            let norm = |v: &[f64; 4]| v.iter().map(|x| x * x).sum::<f64>().sqrt();
            dot / (norm(left) * norm(right))
        };
        DenseMatrix::from_rows(
            vectors
                .iter()
                .map(|left| vectors.iter().map(|right| cosine(left, right)).collect())
                .collect(),
        )
        .expect("similarity")
    }

    #[test]
    fn two_disjoint_groups_form_two_clusters() {
        let partition = markov_cluster(&cosine_block_matrix(), &MclParams::new(2, 2.0)).expect("mcl");

        assert_eq!(partition, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn run_mcl_converges_to_column_stochastic_matrix() {
        let result = run_mcl(&cosine_block_matrix(), &MclParams::default()).expect("mcl");

        assert!(result.converged);
        assert!(result.iterations <= 100);
        for col in 0..result.matrix.cols() {
            let sum: f64 = (0..result.matrix.rows()).map(|row| result.matrix.get(row, col)).sum();
            assert!((sum - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn out_of_range_parameters_are_rejected_before_computation() {
        let empty = DenseMatrix::zeros(0, 0);

        assert!(matches!(
            markov_cluster(&empty, &MclParams::new(1, 2.0)),
            Err(GraphAlgoError::InvalidParameter { name: "expansion", .. })
        ));
        assert!(matches!(
            markov_cluster(&empty, &MclParams::new(2, 0.5)),
            Err(GraphAlgoError::InvalidParameter { name: "inflation", .. })
        ));
        assert!(matches!(
            markov_cluster(&DenseMatrix::zeros(2, 3), &MclParams::default()),
            Err(GraphAlgoError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn empty_matrix_yields_empty_partition() {
        let partition = markov_cluster(&DenseMatrix::zeros(0, 0), &MclParams::default()).expect("mcl");

        assert!(partition.is_empty());
    }

    #[test]
    fn overlapping_attractors_are_resolved_first_claim_wins() {
        let partition = disjoint_partition(vec![vec![0, 1], vec![1, 2]], 4);

        assert_eq!(partition, vec![vec![0, 1], vec![2], vec![3]]);
    }

    #[test]
    fn isolated_nodes_end_up_as_singletons() {
        let similarity = DenseMatrix::from_rows(vec![
            vec![1.0, 1.0, 0.0],
            vec![1.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0],
        ])
        .expect("matrix");

        let partition = markov_cluster(&similarity, &MclParams::default()).expect("mcl");

        assert_eq!(partition, vec![vec![0, 1], vec![2]]);
    }
}
