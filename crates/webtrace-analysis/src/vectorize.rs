use std::collections::HashMap;

use rayon::prelude::*;
use webtrace_core::{CaseId, Trace};
use webtrace_graph_algo::DenseMatrix;

/// Distinct activities of a trace collection, indexed in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    activities: Vec<String>,
    index: HashMap<String, usize>,
}

impl Corpus {
    pub fn build<'a>(traces: impl IntoIterator<Item = &'a Trace>) -> Self {
        let mut corpus = Self::default();
        for trace in traces {
            for event in trace {
                if !corpus.index.contains_key(&event.activity) {
                    corpus
                        .index
                        .insert(event.activity.clone(), corpus.activities.len());
                    corpus.activities.push(event.activity.clone());
                }
            }
        }
        corpus
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn index_of(&self, activity: &str) -> Option<usize> {
        self.index.get(activity).copied()
    }

    pub fn activity(&self, index: usize) -> Option<&str> {
        self.activities.get(index).map(String::as_str)
    }

    pub fn activities(&self) -> &[String] {
        &self.activities
    }
}

/// Bag-of-activities vector: slot `i` counts corpus activity `i` in the trace.
pub fn vectorize_trace(corpus: &Corpus, trace: &Trace) -> Vec<u32> {
    let mut vector = vec![0; corpus.len()];
    for event in trace {
        if let Some(index) = corpus.index_of(&event.activity) {
            vector[index] += 1;
        }
    }
    vector
}

/// Cosine of the angle between two vectors; zero when either is all zeros.
pub fn cosine_similarity(left: &[f64], right: &[f64]) -> f64 {
    if left.is_empty() || left.len() != right.len() {
        return 0.0;
    }
    let mut dot = 0.0;
    let mut left_norm_sq = 0.0;
    let mut right_norm_sq = 0.0;
    for (left_value, right_value) in left.iter().zip(right) {
        dot += left_value * right_value;
        left_norm_sq += left_value * left_value;
        right_norm_sq += right_value * right_value;
    }
    if left_norm_sq <= f64::EPSILON || right_norm_sq <= f64::EPSILON {
        return 0.0;
    }
    (dot / (left_norm_sq * right_norm_sq).sqrt()).clamp(-1.0, 1.0)
}

/// Pairwise cosine similarity of the vectorized traces. Symmetric; the
/// diagonal is exactly 1 for every non-zero vector.
///
/// The vectorizer may yield counts or weights; both are compared as `f64`.
pub fn similarity_matrix<F, V>(traces: &[&Trace], vectorize: F) -> DenseMatrix
where
    F: Fn(&Trace) -> Vec<V> + Sync,
    V: Into<f64>,
{
    let vectors: Vec<Vec<f64>> = traces
        .par_iter()
        .map(|trace| vectorize(trace).into_iter().map(Into::into).collect())
        .collect();
    let rows: Vec<Vec<f64>> = (0..vectors.len())
        .into_par_iter()
        .map(|row| {
            (0..vectors.len())
                .map(|col| {
                    if row == col && vectors[row].iter().any(|value| *value != 0.0) {
                        1.0
                    } else {
                        cosine_similarity(&vectors[row], &vectors[col])
                    }
                })
                .collect()
        })
        .collect();

    let size = rows.len();
    DenseMatrix::from_rows(rows).unwrap_or_else(|_| DenseMatrix::zeros(size, size))
}

/// Activity sequences of traces as corpus indices shifted by one, so that
/// zero only ever means padding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceVectors {
    pub case_ids: Vec<CaseId>,
    pub sequences: Vec<Vec<usize>>,
    pub activities: Vec<Vec<String>>,
    pub max_len: usize,
}

impl SequenceVectors {
    pub fn build(corpus: &Corpus, traces: &[&Trace]) -> Self {
        let mut vectors = Self::default();
        for trace in traces {
            let sequence: Vec<usize> = trace
                .iter()
                .map(|event| corpus.index_of(&event.activity).map_or(0, |index| index + 1))
                .collect();
            vectors.max_len = vectors.max_len.max(sequence.len());
            vectors.case_ids.push(trace.id().to_owned());
            vectors.sequences.push(sequence);
            vectors
                .activities
                .push(trace.activities().into_iter().map(str::to_owned).collect());
        }
        vectors
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// One row per trace, zero-padded to the longest trace.
    pub fn padded(&self) -> DenseMatrix {
        let mut matrix = DenseMatrix::zeros(self.sequences.len(), self.max_len);
        for (row, sequence) in self.sequences.iter().enumerate() {
            for (col, value) in sequence.iter().enumerate() {
                matrix.set(row, col, *value as f64);
            }
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::log_of;

    #[test]
    fn corpus_indexes_activities_in_first_seen_order() {
        let log = log_of(&[("1", &["B", "A"]), ("2", &["C", "B"])]);

        let corpus = Corpus::build(log.traces());

        assert_eq!(corpus.activities(), ["B", "A", "C"]);
        assert_eq!(corpus.index_of("C"), Some(2));
        assert_eq!(corpus.activity(1), Some("A"));
    }

    #[test]
    fn vectors_count_activities_and_ignore_order() {
        let log = log_of(&[("1", &["A", "B", "A"]), ("2", &["B", "A", "A"])]);
        let corpus = Corpus::build(log.traces());

        let first = vectorize_trace(&corpus, &log.traces()[0]);
        let second = vectorize_trace(&corpus, &log.traces()[1]);

        assert_eq!(first, vec![2u32, 1]);
        assert_eq!(first, second);
    }

    #[test]
    fn identical_traces_are_exactly_similar() {
        let log = log_of(&[("1", &["A", "B", "A"]), ("2", &["A", "B", "A"]), ("3", &["C"])]);
        let corpus = Corpus::build(log.traces());
        let traces: Vec<&Trace> = log.traces().iter().collect();

        let similarity = similarity_matrix(&traces, |trace| vectorize_trace(&corpus, trace));

        assert_eq!(similarity.get(0, 1), 1.0);
        assert_eq!(similarity.get(0, 2), 0.0);
        assert!(similarity.is_symmetric());
        for index in 0..3 {
            assert_eq!(similarity.get(index, index), 1.0);
        }
    }

    #[test]
    fn weighted_vectorizers_are_accepted() {
        let log = log_of(&[("1", &["A", "B"]), ("2", &["A", "A", "B", "B"])]);
        let corpus = Corpus::build(log.traces());
        let traces: Vec<&Trace> = log.traces().iter().collect();

        let similarity = similarity_matrix(&traces, |trace| {
            let counts = vectorize_trace(&corpus, trace);
            let total: u32 = counts.iter().sum();
            counts
                .into_iter()
                .map(|count| f64::from(count) / f64::from(total))
                .collect::<Vec<f64>>()
        });

        assert!((similarity.get(0, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn parallel_similarity_is_symmetric_for_uneven_traces() {
        let log = log_of(&[
            ("1", &["A", "B", "C", "A"]),
            ("2", &["B", "B", "D"]),
            ("3", &["C", "A", "E", "E", "E"]),
            ("4", &["D"]),
            ("5", &["A", "E"]),
        ]);
        let corpus = Corpus::build(log.traces());
        let traces: Vec<&Trace> = log.traces().iter().collect();

        let similarity = similarity_matrix(&traces, |trace| vectorize_trace(&corpus, trace));

        assert!(similarity.is_symmetric());
        for row in 0..5 {
            assert_eq!(similarity.get(row, row), 1.0);
            for col in 0..5 {
                assert!((0.0..=1.0).contains(&similarity.get(row, col)));
            }
        }
    }

    #[test]
    fn empty_collection_gives_empty_corpus_and_matrix() {
        let corpus = Corpus::build(std::iter::empty::<&Trace>());
        let similarity = similarity_matrix(&[], |trace| vectorize_trace(&corpus, trace));

        assert!(corpus.is_empty());
        assert_eq!((similarity.rows(), similarity.cols()), (0, 0));
        assert!(SequenceVectors::build(&corpus, &[]).padded().is_empty());
    }

    #[test]
    fn sequences_are_shifted_and_padded() {
        let log = log_of(&[("1", &["A", "B", "A"]), ("2", &["B"])]);
        let corpus = Corpus::build(log.traces());
        let traces: Vec<&Trace> = log.traces().iter().collect();

        let vectors = SequenceVectors::build(&corpus, &traces);

        assert_eq!(vectors.max_len, 3);
        assert_eq!(vectors.sequences, vec![vec![1, 2, 1], vec![2]]);
        assert_eq!(vectors.activities[1], vec!["B".to_owned()]);
        assert_eq!(
            vectors.padded().to_rows(),
            vec![vec![1.0, 2.0, 1.0], vec![2.0, 0.0, 0.0]]
        );
    }
}
