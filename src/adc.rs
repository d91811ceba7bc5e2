//! Asymmetric distance computation kernels.
//!
//! A query is never quantized. Instead, the product quantizer precomputes
//! one table of squared distances per subspace against the query residual,
//! and the distance to any stored code collapses to M table lookups:
//!
//! ```text
//! score(code) = sum over m of tables[m][code[m]]
//! ```
//!
//! This is the inner loop of IVFADC search; everything here is branch-free
//! lookups and adds over a flat table.

/// Per-query lookup tables: M rows of `stride` (= K_s) squared distances,
/// packed contiguously.
#[derive(Debug, Clone)]
pub struct DistanceTables {
    data: Vec<f32>,
    stride: usize,
}

impl DistanceTables {
    pub(crate) fn new(data: Vec<f32>, stride: usize) -> Self {
        debug_assert!(stride > 0 && data.len() % stride == 0);
        Self { data, stride }
    }

    /// Number of subquantizer rows.
    pub fn num_subquantizers(&self) -> usize {
        self.data.len() / self.stride
    }

    /// ADC score of one PQ code: the sum of the table entries the code
    /// selects. Equals the squared distance between the query residual and
    /// the decoded code, up to float rounding.
    #[inline]
    pub fn score(&self, code: &[u8]) -> f32 {
        debug_assert_eq!(code.len(), self.num_subquantizers());
        let mut total = 0.0;
        for (sub, &c) in code.iter().enumerate() {
            total += self.data[sub * self.stride + c as usize];
        }
        total
    }

    /// Score every code in a contiguous buffer of `code_len`-byte codes.
    pub fn scan(&self, codes: &[u8], code_len: usize) -> Vec<f32> {
        codes
            .chunks_exact(code_len)
            .map(|code| self.score(code))
            .collect()
    }
}
