//! Contiguous row-major f32 matrix.
//!
//! All vector collections in locality (training sets, base sets, query
//! batches, residuals) move through this type. Rows are stored back to back
//! in a single allocation so the inner scan loops see contiguous memory.

use crate::error::{IndexError, Result};

/// A dense (rows x dim) matrix of f32 values in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f32>,
    rows: usize,
    dim: usize,
}

impl Matrix {
    /// Create an empty matrix with the given row width.
    pub fn new(dim: usize) -> Self {
        Self {
            data: Vec::new(),
            rows: 0,
            dim,
        }
    }

    /// Create an empty matrix with room for `rows` rows.
    pub fn with_capacity(dim: usize, rows: usize) -> Self {
        Self {
            data: Vec::with_capacity(dim * rows),
            rows: 0,
            dim,
        }
    }

    /// Build a matrix from a flat row-major buffer.
    ///
    /// Fails with `InvalidArgument` when `dim` is zero or the buffer length
    /// is not a multiple of `dim`.
    pub fn from_vec(data: Vec<f32>, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(IndexError::invalid_argument("matrix dim must be >= 1"));
        }
        if data.len() % dim != 0 {
            return Err(IndexError::invalid_argument(format!(
                "buffer of {} values is not a whole number of {}-wide rows",
                data.len(),
                dim
            )));
        }
        let rows = data.len() / dim;
        Ok(Self { data, rows, dim })
    }

    /// Append one row. The slice length must equal the matrix width.
    pub fn push(&mut self, row: &[f32]) {
        assert_eq!(self.dim, row.len());
        self.data.extend_from_slice(row);
        self.rows += 1;
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Row width.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// True when the matrix holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Borrow row `i`.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Iterate over rows in order.
    pub fn iter_rows(&self) -> impl ExactSizeIterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim)
    }

    /// The underlying flat row-major buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_row_access() {
        let mut m = Matrix::new(3);
        m.push(&[1.0, 2.0, 3.0]);
        m.push(&[4.0, 5.0, 6.0]);

        assert_eq!(m.rows(), 2);
        assert_eq!(m.dim(), 3);
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);

        let rows: Vec<&[f32]> = m.iter_rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn from_vec_rejects_ragged_buffers() {
        assert!(Matrix::from_vec(vec![1.0, 2.0, 3.0], 2).is_err());
        assert!(Matrix::from_vec(vec![], 0).is_err());

        let m = Matrix::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert_eq!(m.rows(), 2);
    }

    #[test]
    fn empty_matrix_has_no_rows() {
        let m = Matrix::new(8);
        assert!(m.is_empty());
        assert_eq!(m.iter_rows().len(), 0);
    }
}
