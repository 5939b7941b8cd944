//! HDBSCAN hierarchy and GLOSH outlier scores.
//!
//! Points are compared with the euclidean distance. The hierarchy is the
//! single linkage over mutual reachability distances, condensed so that
//! every cluster keeps at least `min_cluster_size` points.

use std::collections::VecDeque;

use petgraph::unionfind::UnionFind;
use rayon::prelude::*;

use crate::GraphAlgoError;
use crate::matrix::DenseMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HdbscanParams {
    pub min_cluster_size: usize,
    pub min_samples: usize,
}

impl Default for HdbscanParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 4,
            min_samples: 1,
        }
    }
}

impl HdbscanParams {
    pub fn validate(&self) -> Result<(), GraphAlgoError> {
        if self.min_cluster_size < 2 {
            return Err(GraphAlgoError::InvalidParameter {
                name: "min_cluster_size",
                message: format!("must be at least 2, got {}", self.min_cluster_size),
            });
        }
        if self.min_samples < 1 {
            return Err(GraphAlgoError::InvalidParameter {
                name: "min_samples",
                message: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// One merge of the single linkage: clusters `left` and `right` join at
/// distance `delta` into a cluster of `size` points. Points are labeled
/// `0..n`, the merge at row `i` creates label `n + i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkageRow {
    pub left: usize,
    pub right: usize,
    pub delta: f64,
    pub size: usize,
}

/// Edge of the condensed tree. Point children have labels below the number
/// of points; the root cluster is labeled with the number of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CondensedEdge {
    pub parent: usize,
    pub child: usize,
    pub lambda: f64,
    pub size: usize,
}

fn euclidean(left: &[f64], right: &[f64]) -> f64 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt()
}

/// Mutual reachability `max(core(a), core(b), d(a, b))`, where the core
/// distance of a point is the distance to its `min_samples`-th neighbor.
pub fn mutual_reachability(points: &DenseMatrix, min_samples: usize) -> DenseMatrix {
    let n = points.rows();
    let distances: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|row| {
            (0..n)
                .map(|col| euclidean(points.row(row), points.row(col)))
                .collect()
        })
        .collect();

    let neighbor = min_samples.min(n.saturating_sub(1));
    let core: Vec<f64> = distances
        .iter()
        .map(|row| {
            let mut sorted = row.clone();
            sorted.sort_by(f64::total_cmp);
            sorted.get(neighbor).copied().unwrap_or(0.0)
        })
        .collect();

    let mut reachability = DenseMatrix::zeros(n, n);
    for row in 0..n {
        for col in 0..n {
            let value = distances[row][col].max(core[row]).max(core[col]);
            reachability.set(row, col, value);
        }
    }
    reachability
}

/// Prim's minimum spanning tree over a dense distance matrix, edges sorted
/// by weight.
pub fn minimum_spanning_tree(distances: &DenseMatrix) -> Vec<(usize, usize, f64)> {
    let n = distances.rows();
    if n < 2 {
        return Vec::new();
    }

    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut best_from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);
    let mut current = 0;

    for _ in 1..n {
        in_tree[current] = true;
        let mut next: Option<usize> = None;
        for candidate in 0..n {
            if in_tree[candidate] {
                continue;
            }
            let distance = distances.get(current, candidate);
            if distance < best[candidate] {
                best[candidate] = distance;
                best_from[candidate] = current;
            }
            if next.is_none_or(|chosen| best[candidate] < best[chosen]) {
                next = Some(candidate);
            }
        }
        let Some(chosen) = next else {
            break;
        };
        edges.push((best_from[chosen], chosen, best[chosen]));
        current = chosen;
    }

    edges.sort_by(|left, right| left.2.total_cmp(&right.2));
    edges
}

/// Single linkage dendrogram from sorted spanning tree edges.
pub fn single_linkage(edges: &[(usize, usize, f64)], n: usize) -> Vec<LinkageRow> {
    let mut components: UnionFind<usize> = UnionFind::new(n);
    let mut label_of = (0..n).collect::<Vec<_>>();
    let mut size_of = vec![1usize; 2 * n];
    let mut rows = Vec::with_capacity(edges.len());

    for (index, (a, b, delta)) in edges.iter().enumerate() {
        let root_a = components.find(*a);
        let root_b = components.find(*b);
        let left = label_of[root_a];
        let right = label_of[root_b];
        let size = size_of[left] + size_of[right];
        rows.push(LinkageRow {
            left,
            right,
            delta: *delta,
            size,
        });

        components.union(root_a, root_b);
        let merged = n + index;
        label_of[components.find(root_a)] = merged;
        size_of[merged] = size;
    }
    rows
}

/// Nodes below `root` in breadth-first order, `root` included.
fn descendants(linkage: &[LinkageRow], root: usize, n: usize) -> Vec<usize> {
    let mut order = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        order.push(node);
        if node >= n {
            let merge = &linkage[node - n];
            queue.push_back(merge.left);
            queue.push_back(merge.right);
        }
    }
    order
}

/// Condenses the single linkage: a split only creates new clusters when
/// both sides keep `min_cluster_size` points; smaller sides fall out of
/// their parent as individual points at `lambda = 1 / distance`.
pub fn condense_tree(linkage: &[LinkageRow], min_cluster_size: usize) -> Vec<CondensedEdge> {
    let n = linkage.len() + 1;
    let root = 2 * linkage.len();
    let mut relabel = vec![0usize; root + 1];
    relabel[root] = n;
    let mut next_label = n + 1;
    let mut ignore = vec![false; root + 1];
    let mut edges = Vec::new();

    let size_of = |node: usize| if node >= n { linkage[node - n].size } else { 1 };

    for node in descendants(linkage, root, n) {
        if ignore[node] || node < n {
            continue;
        }
        let merge = linkage[node - n];
        let lambda = if merge.delta > 0.0 {
            1.0 / merge.delta
        } else {
            f64::INFINITY
        };
        let parent = relabel[node];
        let left_size = size_of(merge.left);
        let right_size = size_of(merge.right);
        let left_big = left_size >= min_cluster_size;
        let right_big = right_size >= min_cluster_size;

        let fall_out = |side: usize, ignore: &mut [bool], edges: &mut Vec<CondensedEdge>| {
            for sub_node in descendants(linkage, side, n) {
                if sub_node < n {
                    edges.push(CondensedEdge {
                        parent,
                        child: sub_node,
                        lambda,
                        size: 1,
                    });
                }
                ignore[sub_node] = true;
            }
        };

        match (left_big, right_big) {
            (true, true) => {
                for (side, size) in [(merge.left, left_size), (merge.right, right_size)] {
                    relabel[side] = next_label;
                    next_label += 1;
                    edges.push(CondensedEdge {
                        parent,
                        child: relabel[side],
                        lambda,
                        size,
                    });
                }
            }
            (false, false) => {
                fall_out(merge.left, &mut ignore, &mut edges);
                fall_out(merge.right, &mut ignore, &mut edges);
            }
            (false, true) => {
                relabel[merge.right] = parent;
                fall_out(merge.left, &mut ignore, &mut edges);
            }
            (true, false) => {
                relabel[merge.left] = parent;
                fall_out(merge.right, &mut ignore, &mut edges);
            }
        }
    }
    edges
}

/// GLOSH score per point: `(lambda_max - lambda_point) / lambda_max`, where
/// `lambda_max` is the largest finite lambda reached anywhere below the
/// point's cluster.
///
/// Duplicate points leave their cluster at an infinite lambda. They score 0
/// and do not count towards `lambda_max`, so the remaining points keep a
/// graded score instead of all saturating at 1.
pub fn glosh_scores(tree: &[CondensedEdge], n: usize) -> Vec<f64> {
    let mut scores = vec![0.0; n];
    let Some(largest) = tree.iter().map(|edge| edge.parent).max() else {
        return scores;
    };

    let mut deaths = vec![0.0f64; largest + 1];
    for edge in tree.iter().filter(|edge| edge.lambda.is_finite()) {
        deaths[edge.parent] = deaths[edge.parent].max(edge.lambda);
    }

    // Child clusters always carry larger labels than their parents.
    let mut cluster_edges: Vec<&CondensedEdge> = tree.iter().filter(|edge| edge.child >= n).collect();
    cluster_edges.sort_by(|left, right| right.child.cmp(&left.child));
    for edge in cluster_edges {
        if edge.child <= largest && deaths[edge.child] > deaths[edge.parent] {
            deaths[edge.parent] = deaths[edge.child];
        }
    }

    for edge in tree.iter().filter(|edge| edge.child < n) {
        let lambda_max = deaths[edge.parent];
        scores[edge.child] = if lambda_max == 0.0 || !edge.lambda.is_finite() {
            0.0
        } else {
            ((lambda_max - edge.lambda) / lambda_max).clamp(0.0, 1.0)
        };
    }
    scores
}

/// GLOSH outlier score in `[0, 1]` for every row of `points`.
pub fn outlier_scores(points: &DenseMatrix, params: &HdbscanParams) -> Result<Vec<f64>, GraphAlgoError> {
    params.validate()?;
    let n = points.rows();
    if n <= 1 {
        return Ok(vec![0.0; n]);
    }

    let reachability = mutual_reachability(points, params.min_samples);
    let spanning_tree = minimum_spanning_tree(&reachability);
    let linkage = single_linkage(&spanning_tree, n);
    let tree = condense_tree(&linkage, params.min_cluster_size);
    let scores = glosh_scores(&tree, n);
    tracing::debug!(
        points = n,
        condensed_edges = tree.len(),
        "computed glosh outlier scores"
    );
    Ok(scores)
}
