//! Product quantizer.
//!
//! Splits the D-dimensional space into M contiguous subspaces of width
//! D/M and trains one k-means codebook of K_s centroids per subspace. A
//! vector encodes to M one-byte codewords (K_s is capped at 256), so a
//! stored vector costs M bytes instead of 4D.
//!
//! Training the M subquantizers is embarrassingly parallel; each one runs
//! on its own derived seed (`seed + m`) so the streams are independent but
//! reproducible.

use log::debug;
use rayon::prelude::*;

use crate::adc::DistanceTables;
use crate::distance::{l2_squared, nearest_row};
use crate::error::{IndexError, Result};
use crate::kmeans::KMeans;
use crate::matrix::Matrix;

/// Product quantizer configuration plus (after `train`) the M codebooks.
#[derive(Debug, Clone)]
pub struct ProductQuantizer {
    num_subquantizers: usize,
    num_centroids: usize,
    max_iter: usize,
    seed: u64,
    /// Subspace width D/M; zero until trained.
    sub_dim: usize,
    /// M codebooks of (K_s x sub_dim) centroids, packed in subspace order.
    codebooks: Vec<f32>,
}

impl ProductQuantizer {
    /// Create an untrained quantizer with `num_subquantizers` subspaces of
    /// `num_centroids` codewords each.
    ///
    /// `num_centroids` must lie in [1, 256]: codes are stored one byte per
    /// subquantizer, in memory and on disk.
    pub fn new(
        num_subquantizers: usize,
        num_centroids: usize,
        max_iter: usize,
        seed: u64,
    ) -> Result<Self> {
        if num_subquantizers < 1 {
            return Err(IndexError::invalid_argument(
                "number of subquantizers must be >= 1",
            ));
        }
        if num_centroids < 1 || num_centroids > 256 {
            return Err(IndexError::invalid_argument(format!(
                "centroids per subquantizer must be in [1, 256], was {num_centroids}"
            )));
        }
        Ok(Self {
            num_subquantizers,
            num_centroids,
            max_iter,
            seed,
            sub_dim: 0,
            codebooks: Vec::new(),
        })
    }

    /// Rebuild a trained quantizer from a flat codebook buffer of shape
    /// (M x K_s x sub_dim), as read back from a serialized index.
    pub fn from_codebooks(
        codebooks: Vec<f32>,
        num_subquantizers: usize,
        num_centroids: usize,
        sub_dim: usize,
    ) -> Result<Self> {
        let mut pq = Self::new(num_subquantizers, num_centroids, 0, 0)?;
        if sub_dim == 0 || codebooks.len() != num_subquantizers * num_centroids * sub_dim {
            return Err(IndexError::invalid_argument(format!(
                "codebook buffer of {} values does not match {} x {} x {}",
                codebooks.len(),
                num_subquantizers,
                num_centroids,
                sub_dim
            )));
        }
        pq.sub_dim = sub_dim;
        pq.codebooks = codebooks;
        Ok(pq)
    }

    /// Train one codebook per subspace on the columns of `x`.
    ///
    /// Fails with `InvalidArgument`, before any training work, when the
    /// width of `x` is not divisible by the number of subquantizers.
    pub fn train(&mut self, x: &Matrix) -> Result<()> {
        let dim = x.dim();
        let m = self.num_subquantizers;
        if dim % m != 0 {
            return Err(IndexError::invalid_argument(format!(
                "dimension {dim} is not a multiple of {m} subquantizers"
            )));
        }
        let sub_dim = dim / m;

        let models: Vec<KMeans> = (0..m)
            .into_par_iter()
            .map(|sub| {
                let mut block = Matrix::with_capacity(sub_dim, x.rows());
                for row in x.iter_rows() {
                    block.push(&row[sub * sub_dim..(sub + 1) * sub_dim]);
                }
                KMeans::train(
                    &block,
                    self.num_centroids,
                    self.max_iter,
                    self.seed.wrapping_add(sub as u64),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let mut codebooks = Vec::with_capacity(m * self.num_centroids * sub_dim);
        for model in &models {
            codebooks.extend_from_slice(model.centroids());
        }
        self.sub_dim = sub_dim;
        self.codebooks = codebooks;
        debug!("product quantizer trained: {m} x {} codewords of width {sub_dim}", self.num_centroids);
        Ok(())
    }

    /// Number of subquantizers (M).
    pub fn num_subquantizers(&self) -> usize {
        self.num_subquantizers
    }

    /// Codewords per subquantizer (K_s).
    pub fn num_centroids(&self) -> usize {
        self.num_centroids
    }

    /// Subspace width D/M; zero until trained.
    pub fn sub_dim(&self) -> usize {
        self.sub_dim
    }

    /// Whether `train` has completed.
    pub fn is_trained(&self) -> bool {
        !self.codebooks.is_empty()
    }

    /// The full (M x K_s x sub_dim) codebook buffer.
    pub fn codebooks(&self) -> &[f32] {
        &self.codebooks
    }

    fn trained_dim(&self) -> Result<usize> {
        if self.codebooks.is_empty() {
            return Err(IndexError::invalid_state("product quantizer is not trained"));
        }
        Ok(self.sub_dim * self.num_subquantizers)
    }

    fn codebook(&self, sub: usize) -> &[f32] {
        let span = self.num_centroids * self.sub_dim;
        &self.codebooks[sub * span..(sub + 1) * span]
    }

    fn check_width(&self, len: usize, what: &str) -> Result<()> {
        let dim = self.trained_dim()?;
        if len != dim {
            return Err(IndexError::invalid_argument(format!(
                "{what} has width {len}, quantizer was trained on width {dim}"
            )));
        }
        Ok(())
    }

    #[inline]
    fn encode_row(&self, v: &[f32], out: &mut [u8]) {
        for sub in 0..self.num_subquantizers {
            let slice = &v[sub * self.sub_dim..(sub + 1) * self.sub_dim];
            out[sub] = nearest_row(self.codebook(sub), self.sub_dim, slice).0 as u8;
        }
    }

    /// Encode `v` to M one-byte codewords.
    pub fn encode(&self, v: &[f32]) -> Result<Vec<u8>> {
        self.check_width(v.len(), "vector")?;
        let mut code = vec![0u8; self.num_subquantizers];
        self.encode_row(v, &mut code);
        Ok(code)
    }

    /// Encode every row of `x` into one flat buffer of M bytes per row,
    /// in row order. Per-row results are identical to `encode`.
    pub fn encode_many(&self, x: &Matrix) -> Result<Vec<u8>> {
        self.check_width(x.dim(), "matrix")?;
        let m = self.num_subquantizers;
        let mut codes = vec![0u8; x.rows() * m];
        codes
            .par_chunks_mut(m)
            .zip(x.as_slice().par_chunks(x.dim()))
            .for_each(|(out, row)| self.encode_row(row, out));
        Ok(codes)
    }

    /// Reconstruct the approximation a code stands for: the concatenation
    /// of the selected codewords. Diagnostic only; search never decodes.
    pub fn decode(&self, code: &[u8]) -> Result<Vec<f32>> {
        let dim = self.trained_dim()?;
        if code.len() != self.num_subquantizers {
            return Err(IndexError::invalid_argument(format!(
                "code has {} subcodes, expected {}",
                code.len(),
                self.num_subquantizers
            )));
        }
        let mut v = Vec::with_capacity(dim);
        for (sub, &c) in code.iter().enumerate() {
            let book = self.codebook(sub);
            let c = c as usize;
            v.extend_from_slice(&book[c * self.sub_dim..(c + 1) * self.sub_dim]);
        }
        Ok(v)
    }

    /// Build the per-query lookup tables for a residual: entry (m, k) is
    /// the squared distance between the m-th slice of `q_residual` and the
    /// k-th codeword of subquantizer m.
    pub fn build_tables(&self, q_residual: &[f32]) -> Result<DistanceTables> {
        self.check_width(q_residual.len(), "query residual")?;
        let mut data = Vec::with_capacity(self.num_subquantizers * self.num_centroids);
        for sub in 0..self.num_subquantizers {
            let slice = &q_residual[sub * self.sub_dim..(sub + 1) * self.sub_dim];
            for codeword in self.codebook(sub).chunks_exact(self.sub_dim) {
                data.push(l2_squared(slice, codeword));
            }
        }
        Ok(DistanceTables::new(data, self.num_centroids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread_matrix(rows: usize, dim: usize) -> Matrix {
        // Deterministic, well-separated rows.
        let mut m = Matrix::new(dim);
        for i in 0..rows {
            let row: Vec<f32> = (0..dim).map(|d| (i * dim + d) as f32 * 1.5).collect();
            m.push(&row);
        }
        m
    }

    #[test]
    fn rejects_indivisible_dimension_before_training() {
        let mut pq = ProductQuantizer::new(3, 2, 10, 0).unwrap();
        let x = spread_matrix(6, 10);
        assert!(matches!(
            pq.train(&x),
            Err(IndexError::InvalidArgument(_))
        ));
        assert!(!pq.is_trained());
    }

    #[test]
    fn rejects_oversized_codebooks() {
        assert!(ProductQuantizer::new(4, 257, 10, 0).is_err());
        assert!(ProductQuantizer::new(4, 0, 10, 0).is_err());
        assert!(ProductQuantizer::new(0, 16, 10, 0).is_err());
    }

    #[test]
    fn score_matches_distance_to_decoded_code() {
        let x = spread_matrix(16, 8);
        let mut pq = ProductQuantizer::new(4, 8, 25, 1).unwrap();
        pq.train(&x).unwrap();

        for row in x.iter_rows() {
            let code = pq.encode(row).unwrap();
            let tables = pq.build_tables(row).unwrap();
            let score = tables.score(&code);
            let exact = l2_squared(row, &pq.decode(&code).unwrap());
            let tol = 1e-5 * exact.max(1.0);
            assert!(
                (score - exact).abs() <= tol,
                "score {score} vs decoded distance {exact}"
            );
        }
    }

    #[test]
    fn reencoding_a_decoded_code_is_idempotent() {
        let x = spread_matrix(12, 6);
        let mut pq = ProductQuantizer::new(2, 6, 25, 3).unwrap();
        pq.train(&x).unwrap();

        for row in x.iter_rows() {
            let code = pq.encode(row).unwrap();
            let decoded = pq.decode(&code).unwrap();
            assert_eq!(pq.encode(&decoded).unwrap(), code);
        }
    }

    #[test]
    fn encode_many_matches_encode() {
        let x = spread_matrix(10, 8);
        let mut pq = ProductQuantizer::new(4, 4, 20, 9).unwrap();
        pq.train(&x).unwrap();

        let codes = pq.encode_many(&x).unwrap();
        let m = pq.num_subquantizers();
        for (i, row) in x.iter_rows().enumerate() {
            assert_eq!(&codes[i * m..(i + 1) * m], pq.encode(row).unwrap());
        }
    }

    #[test]
    fn perfect_reconstruction_when_every_row_is_a_codeword() {
        // K_s equal to the number of distinct training rows: every row
        // becomes its own codeword and encodes losslessly.
        let x = spread_matrix(4, 4);
        let mut pq = ProductQuantizer::new(4, 4, 20, 0).unwrap();
        pq.train(&x).unwrap();

        for row in x.iter_rows() {
            let code = pq.encode(row).unwrap();
            let tables = pq.build_tables(row).unwrap();
            assert!(tables.score(&code).abs() < 1e-6);
        }
    }
}
