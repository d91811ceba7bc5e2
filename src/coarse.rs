//! Coarse quantizer: first-level partitioning of the vector space.
//!
//! One k-means model over the full dimension. Every indexed vector belongs
//! to the Voronoi cell of its nearest coarse centroid, and the inverted
//! index is keyed by these cell ids.

use crate::distance::sub;
use crate::error::{IndexError, Result};
use crate::kmeans::KMeans;
use crate::matrix::Matrix;

/// Coarse quantizer configuration plus (after `train`) the fitted model.
#[derive(Debug, Clone)]
pub struct CoarseQuantizer {
    num_centroids: usize,
    max_iter: usize,
    seed: u64,
    model: Option<KMeans>,
}

impl CoarseQuantizer {
    /// Create an untrained quantizer with `num_centroids` cells.
    pub fn new(num_centroids: usize, max_iter: usize, seed: u64) -> Self {
        Self {
            num_centroids,
            max_iter,
            seed,
            model: None,
        }
    }

    /// Rebuild a trained quantizer from a flat (k x dim) centroid matrix,
    /// as read back from a serialized index.
    pub fn from_centroids(centroids: Vec<f32>, dim: usize) -> Result<Self> {
        let model = KMeans::from_centroids(centroids, dim)?;
        Ok(Self {
            num_centroids: model.k(),
            max_iter: 0,
            seed: 0,
            model: Some(model),
        })
    }

    /// Fit the centroid set on `sample`. A second call replaces the model.
    pub fn train(&mut self, sample: &Matrix) -> Result<()> {
        self.model = Some(KMeans::train(
            sample,
            self.num_centroids,
            self.max_iter,
            self.seed,
        )?);
        Ok(())
    }

    /// Number of coarse cells.
    pub fn num_cells(&self) -> usize {
        self.num_centroids
    }

    /// Whether `train` has completed.
    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn model(&self) -> Result<&KMeans> {
        self.model
            .as_ref()
            .ok_or_else(|| IndexError::invalid_state("coarse quantizer is not trained"))
    }

    /// Cell id of the centroid nearest to `v` (lowest index on ties).
    pub fn assign(&self, v: &[f32]) -> Result<usize> {
        Ok(self.model()?.assign(v))
    }

    /// Assign every row of `x`; per-row results identical to `assign`.
    pub fn assign_many(&self, x: &Matrix) -> Result<Vec<usize>> {
        Ok(self.model()?.assign_many(x))
    }

    /// `v` minus the centroid of its cell.
    pub fn residual(&self, v: &[f32]) -> Result<Vec<f32>> {
        let model = self.model()?;
        let cell = model.assign(v);
        Ok(sub(v, model.centroid(cell)))
    }

    /// The (K_c x D) centroid matrix as a flat row-major slice.
    pub fn centroids(&self) -> Result<&[f32]> {
        Ok(self.model()?.centroids())
    }

    /// Borrow the centroid of one cell.
    pub fn centroid(&self, cell: usize) -> Result<&[f32]> {
        Ok(self.model()?.centroid(cell))
    }

    /// Ids of the `w` cells whose centroids are nearest to `v`, ordered by
    /// ascending (squared distance, cell id).
    pub fn nearest_cells(&self, v: &[f32], w: usize) -> Result<Vec<usize>> {
        let model = self.model()?;
        let mut by_dist: Vec<(f32, usize)> = model
            .centroids()
            .chunks_exact(model.dim())
            .enumerate()
            .map(|(cell, c)| (crate::distance::l2_squared(v, c), cell))
            .collect();
        by_dist.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(by_dist.into_iter().take(w).map(|(_, cell)| cell).collect())
    }
}
