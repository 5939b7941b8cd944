use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use webtrace_core::EventLog;

use crate::AnalysisError;

/// Directly-follows relation between two activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Footprint {
    Parallel,
    Forward,
    Backward,
    Never,
}

impl Footprint {
    pub fn from_counts(forward: u64, backward: u64) -> Self {
        match (forward > 0, backward > 0) {
            (true, true) => Self::Parallel,
            (true, false) => Self::Forward,
            (false, true) => Self::Backward,
            (false, false) => Self::Never,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parallel => "||",
            Self::Forward => "→",
            Self::Backward => "←",
            Self::Never => "#",
        }
    }
}

impl fmt::Display for Footprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Square activity × activity table. Rows and columns share the label order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationMatrix<T> {
    labels: Vec<String>,
    values: Vec<T>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl<T: Clone> RelationMatrix<T> {
    pub fn filled(labels: Vec<String>, value: T) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(position, label)| (label.clone(), position))
            .collect();
        let values = vec![value; labels.len() * labels.len()];
        Self {
            labels,
            values,
            index,
        }
    }
}

impl<T> RelationMatrix<T> {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn at(&self, row: usize, col: usize) -> &T {
        &self.values[row * self.labels.len() + col]
    }

    fn at_mut(&mut self, row: usize, col: usize) -> &mut T {
        let size = self.labels.len();
        &mut self.values[row * size + col]
    }

    pub fn get(&self, row: &str, col: &str) -> Result<&T, AnalysisError> {
        let row = self.require(row)?;
        let col = self.require(col)?;
        Ok(self.at(row, col))
    }

    fn require(&self, label: &str) -> Result<usize, AnalysisError> {
        self.index_of(label)
            .ok_or_else(|| AnalysisError::UnknownActivity {
                activity: label.to_owned(),
            })
    }

    /// Builds a matrix over the same labels from a cell function.
    pub fn map_cells<U>(&self, f: impl Fn(usize, usize) -> U) -> RelationMatrix<U> {
        let size = self.labels.len();
        let values = (0..size * size).map(|cell| f(cell / size, cell % size)).collect();
        RelationMatrix {
            labels: self.labels.clone(),
            values,
            index: self.index.clone(),
        }
    }
}

impl<T: fmt::Display> RelationMatrix<T> {
    /// Header row of labels, then one labeled row per activity.
    pub fn to_table(&self) -> Vec<Vec<String>> {
        let mut table = Vec::with_capacity(self.labels.len() + 1);
        let mut header = vec![String::new()];
        header.extend(self.labels.iter().cloned());
        table.push(header);
        for (row, label) in self.labels.iter().enumerate() {
            let mut line = vec![label.clone()];
            line.extend((0..self.labels.len()).map(|col| self.at(row, col).to_string()));
            table.push(line);
        }
        table
    }
}

/// Counts how often activity `a` is immediately followed by `b` within a trace.
pub fn transition_matrix(log: &EventLog) -> RelationMatrix<u64> {
    let mut matrix = RelationMatrix::filled(log.unique_activities(), 0u64);
    for trace in log {
        for pair in trace.events().windows(2) {
            let from = matrix.index_of(&pair[0].activity);
            let to = matrix.index_of(&pair[1].activity);
            if let (Some(from), Some(to)) = (from, to) {
                *matrix.at_mut(from, to) += 1;
            }
        }
    }
    tracing::debug!(activities = matrix.size(), "built transition matrix");
    matrix
}

pub fn footprint_from_transitions(transitions: &RelationMatrix<u64>) -> RelationMatrix<Footprint> {
    transitions.map_cells(|row, col| {
        Footprint::from_counts(*transitions.at(row, col), *transitions.at(col, row))
    })
}

/// `(f - b) / (f + b + 1)` for forward count `f` and backward count `b`.
pub fn heuristic_from_transitions(transitions: &RelationMatrix<u64>) -> RelationMatrix<f64> {
    transitions.map_cells(|row, col| {
        let forward = *transitions.at(row, col) as f64;
        let backward = *transitions.at(col, row) as f64;
        (forward - backward) / (forward + backward + 1.0)
    })
}

pub fn footprint_matrix(log: &EventLog) -> RelationMatrix<Footprint> {
    footprint_from_transitions(&transition_matrix(log))
}

pub fn heuristic_matrix(log: &EventLog) -> RelationMatrix<f64> {
    heuristic_from_transitions(&transition_matrix(log))
}

/// One node per activity and an edge for every positive dependency score.
pub fn directly_follows_graph(heuristic: &RelationMatrix<f64>) -> DiGraph<String, f64> {
    let mut graph = DiGraph::with_capacity(heuristic.size(), 0);
    let nodes: Vec<NodeIndex> = heuristic
        .labels()
        .iter()
        .map(|label| graph.add_node(label.clone()))
        .collect();
    for (row, from) in nodes.iter().enumerate() {
        for (col, to) in nodes.iter().enumerate() {
            let score = *heuristic.at(row, col);
            if score > 0.0 {
                graph.add_edge(*from, *to, score);
            }
        }
    }
    graph
}
