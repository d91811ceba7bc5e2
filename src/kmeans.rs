//! k-means clustering (Lloyd's algorithm).
//!
//! Used twice by the index: once over the full dimension for the coarse
//! quantizer, and once per subspace for the product quantizer codebooks.
//!
//! Initialization draws K distinct sample rows uniformly without
//! replacement from a stream seeded by the caller, so training is
//! bit-identical for identical (sample, k, max_iter, seed). Assignment
//! ties break to the lowest centroid index, and a cluster that receives no
//! rows keeps its previous centroid; the centroid count is always exactly
//! K.
//!
//! The assignment step and the per-cluster sum reduction are parallelized
//! over fixed-size row chunks whose partial results merge in chunk order,
//! so the result does not depend on the worker count.

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::distance::nearest_row;
use crate::error::{IndexError, Result};
use crate::matrix::Matrix;

/// Rows per parallel work unit. Fixed (rather than derived from the pool
/// size) so reductions always merge in the same order.
const CHUNK_ROWS: usize = 1024;

/// A trained k-means model: a (k x dim) centroid matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    centroids: Vec<f32>,
    k: usize,
    dim: usize,
}

impl KMeans {
    /// Run Lloyd's algorithm over `sample` and return the fitted model.
    ///
    /// Terminates after `max_iter` iterations or as soon as no assignment
    /// changes between consecutive iterations. Fails with
    /// `InvalidArgument` when the sample has fewer rows than `k`, or when
    /// `k` or the sample width is zero.
    pub fn train(sample: &Matrix, k: usize, max_iter: usize, seed: u64) -> Result<Self> {
        let n = sample.rows();
        let dim = sample.dim();
        if k < 1 {
            return Err(IndexError::invalid_argument("k must be >= 1"));
        }
        if dim < 1 {
            return Err(IndexError::invalid_argument("sample width must be >= 1"));
        }
        if n < k {
            return Err(IndexError::invalid_argument(format!(
                "sample of {n} rows is too small for k = {k}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let picks = rand::seq::index::sample(&mut rng, n, k);
        let mut centroids = Vec::with_capacity(k * dim);
        for i in picks.iter() {
            centroids.extend_from_slice(sample.row(i));
        }

        let mut assignments: Vec<usize> = vec![usize::MAX; n];
        for iter in 0..max_iter {
            let next = assign_rows(&centroids, dim, sample);
            if next == assignments {
                debug!("k-means converged after {iter} iterations (k = {k})");
                break;
            }

            let (sums, counts) = cluster_sums(sample, &next, k);
            for c in 0..k {
                // A cluster with no rows keeps its previous centroid.
                if counts[c] > 0 {
                    let count = counts[c] as f32;
                    for d in 0..dim {
                        centroids[c * dim + d] = sums[c * dim + d] / count;
                    }
                }
            }
            assignments = next;
        }

        Ok(Self { centroids, k, dim })
    }

    /// Rebuild a model from an existing (k x dim) centroid matrix.
    pub fn from_centroids(centroids: Vec<f32>, dim: usize) -> Result<Self> {
        if dim == 0 || centroids.is_empty() || centroids.len() % dim != 0 {
            return Err(IndexError::invalid_argument(format!(
                "centroid buffer of {} values does not form {}-wide rows",
                centroids.len(),
                dim
            )));
        }
        let k = centroids.len() / dim;
        Ok(Self { centroids, k, dim })
    }

    /// Number of centroids.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Centroid width.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The (k x dim) centroid matrix as a flat row-major slice.
    pub fn centroids(&self) -> &[f32] {
        &self.centroids
    }

    /// Borrow centroid `i`.
    pub fn centroid(&self, i: usize) -> &[f32] {
        &self.centroids[i * self.dim..(i + 1) * self.dim]
    }

    /// Index of the centroid nearest to `v` (lowest index on ties).
    #[inline]
    pub fn assign(&self, v: &[f32]) -> usize {
        nearest_row(&self.centroids, self.dim, v).0
    }

    /// Like [`assign`](Self::assign), also returning the squared distance.
    #[inline]
    pub fn assign_with_distance(&self, v: &[f32]) -> (usize, f32) {
        nearest_row(&self.centroids, self.dim, v)
    }

    /// Assign every row of `x`. Identical per-row results to `assign`.
    pub fn assign_many(&self, x: &Matrix) -> Vec<usize> {
        assign_rows(&self.centroids, self.dim, x)
    }
}

/// Parallel assignment of every sample row to its nearest centroid.
fn assign_rows(centroids: &[f32], dim: usize, sample: &Matrix) -> Vec<usize> {
    sample
        .as_slice()
        .par_chunks(CHUNK_ROWS * dim)
        .flat_map_iter(|block| {
            block
                .chunks_exact(dim)
                .map(|row| nearest_row(centroids, dim, row).0)
        })
        .collect()
}

/// Per-cluster coordinate sums and row counts, reduced over fixed-size
/// chunks and merged in chunk order.
fn cluster_sums(sample: &Matrix, assignments: &[usize], k: usize) -> (Vec<f32>, Vec<usize>) {
    let dim = sample.dim();
    let partials: Vec<(Vec<f32>, Vec<usize>)> = sample
        .as_slice()
        .par_chunks(CHUNK_ROWS * dim)
        .zip(assignments.par_chunks(CHUNK_ROWS))
        .map(|(block, assigned)| {
            let mut sums = vec![0.0f32; k * dim];
            let mut counts = vec![0usize; k];
            for (row, &c) in block.chunks_exact(dim).zip(assigned) {
                counts[c] += 1;
                for (d, &x) in row.iter().enumerate() {
                    sums[c * dim + d] += x;
                }
            }
            (sums, counts)
        })
        .collect();

    let mut sums = vec![0.0f32; k * dim];
    let mut counts = vec![0usize; k];
    for (part_sums, part_counts) in partials {
        for (acc, v) in sums.iter_mut().zip(part_sums) {
            *acc += v;
        }
        for (acc, v) in counts.iter_mut().zip(part_counts) {
            *acc += v;
        }
    }
    (sums, counts)
}
