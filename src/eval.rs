//! Recall evaluation.
//!
//! recall@R follows the TEXMEX convention: the fraction of queries whose
//! *true* nearest neighbor appears somewhere in the first R returned ids.

use rayon::prelude::*;

use crate::distance::l2_squared;
use crate::matrix::Matrix;

/// recall@R over a query batch.
///
/// `true_first[i]` is the id of query i's exact nearest neighbor;
/// `results[i]` holds the returned ids in rank order.
pub fn recall_at_r(true_first: &[u64], results: &[Vec<u64>], r: usize) -> f32 {
    debug_assert_eq!(true_first.len(), results.len());
    if results.is_empty() {
        return 0.0;
    }
    let hits = results
        .iter()
        .zip(true_first)
        .filter(|(ids, &truth)| ids.iter().take(r).any(|&id| id == truth))
        .count();
    hits as f32 / results.len() as f32
}

/// Brute-force ids of the k nearest base rows to one query, by ascending
/// (squared distance, id).
pub fn ground_truth(base: &Matrix, query: &[f32], k: usize) -> Vec<u64> {
    let mut by_dist: Vec<(f32, u64)> = base
        .iter_rows()
        .enumerate()
        .map(|(i, row)| (l2_squared(query, row), i as u64))
        .collect();
    by_dist.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    by_dist.into_iter().take(k).map(|(_, id)| id).collect()
}

/// Ground truth for every query row, gathered in query order.
pub fn ground_truth_all(base: &Matrix, queries: &Matrix, k: usize) -> Vec<Vec<u64>> {
    (0..queries.rows())
        .into_par_iter()
        .map(|i| ground_truth(base, queries.row(i), k))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_counts_true_neighbor_in_top_r() {
        let truth = vec![0, 5, 9];
        let results = vec![
            vec![0, 1, 2], // hit at rank 1
            vec![1, 2, 5], // hit at rank 3
            vec![1, 2, 3], // miss
        ];
        assert!((recall_at_r(&truth, &results, 3) - 2.0 / 3.0).abs() < 1e-6);
        assert!((recall_at_r(&truth, &results, 1) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn ground_truth_orders_by_distance_then_id() {
        let base = Matrix::from_vec(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0], 2).unwrap();
        let gt = ground_truth(&base, &[0.9, 0.0], 3);
        // Rows 1 and 3 are identical; the lower id comes first.
        assert_eq!(gt, vec![1, 3, 0]);
    }
}
