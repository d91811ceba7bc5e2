//! IVFADC engine: training, insertion and search.

use log::{debug, info};
use rayon::prelude::*;

use crate::coarse::CoarseQuantizer;
use crate::distance::sub;
use crate::error::{IndexError, Result};
use crate::heap::{Neighbor, TopK};
use crate::invlist::InvertedIndex;
use crate::matrix::Matrix;
use crate::pq::ProductQuantizer;

/// IVFADC construction parameters.
#[derive(Debug, Clone)]
pub struct IvfAdcParams {
    /// Number of coarse cells (K_c).
    pub coarse_centroids: usize,
    /// Maximum Lloyd iterations for the coarse quantizer.
    pub coarse_max_iter: usize,
    /// Seed for the coarse quantizer's RNG stream.
    pub coarse_seed: u64,
    /// Number of PQ subquantizers (M). Must divide the data dimension.
    pub pq_subquantizers: usize,
    /// Codewords per subquantizer (K_s), at most 256.
    pub pq_centroids: usize,
    /// Maximum Lloyd iterations per subquantizer.
    pub pq_max_iter: usize,
    /// Base seed for the subquantizers; subquantizer m trains on seed + m.
    pub pq_seed: u64,
}

impl Default for IvfAdcParams {
    fn default() -> Self {
        Self {
            coarse_centroids: 1000,
            coarse_max_iter: 50,
            coarse_seed: 0,
            pq_subquantizers: 8,
            pq_centroids: 256,
            pq_max_iter: 50,
            pq_seed: 0,
        }
    }
}

/// Lifecycle of the engine. Training is one-shot; insertion and search
/// are gated on the state reached so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Untrained,
    Trained,
    Populated,
}

/// The IVFADC index.
///
/// Owns the two quantizers and the inverted lists for its whole lifetime.
/// Centroids are immutable once trained; lists only grow. `search` takes
/// `&self` and may run concurrently from many threads.
pub struct IvfAdc {
    pub(crate) coarse: CoarseQuantizer,
    pub(crate) pq: ProductQuantizer,
    pub(crate) lists: InvertedIndex,
    pub(crate) state: State,
    /// Data dimension D; zero until trained.
    pub(crate) dim: usize,
    /// Next original id to hand out; ids are globally unique and monotonic.
    pub(crate) next_id: u64,
}

impl IvfAdc {
    /// Create an untrained engine.
    pub fn new(params: IvfAdcParams) -> Result<Self> {
        if params.coarse_centroids < 1 {
            return Err(IndexError::invalid_argument(
                "number of coarse centroids must be >= 1",
            ));
        }
        let pq = ProductQuantizer::new(
            params.pq_subquantizers,
            params.pq_centroids,
            params.pq_max_iter,
            params.pq_seed,
        )?;
        let lists = InvertedIndex::new(params.coarse_centroids, params.pq_subquantizers);
        Ok(Self {
            coarse: CoarseQuantizer::new(
                params.coarse_centroids,
                params.coarse_max_iter,
                params.coarse_seed,
            ),
            pq,
            lists,
            state: State::Untrained,
            dim: 0,
            next_id: 0,
        })
    }

    /// Train both quantizers: the coarse quantizer on `train_set`, then
    /// the product quantizer on the residuals of `train_set` against its
    /// coarse assignments.
    ///
    /// Fails with `InvalidState` on an already-trained engine and
    /// `InvalidArgument` on shape problems; on any failure the engine is
    /// observably unchanged.
    pub fn train(&mut self, train_set: &Matrix) -> Result<()> {
        if self.state != State::Untrained {
            return Err(IndexError::invalid_state(
                "train on an already-trained index",
            ));
        }
        let dim = train_set.dim();
        let m = self.pq.num_subquantizers();
        if dim % m != 0 {
            return Err(IndexError::invalid_argument(format!(
                "dimension {dim} is not a multiple of {m} subquantizers"
            )));
        }

        debug!(
            "training coarse quantizer on {} x {dim} vectors",
            train_set.rows()
        );
        self.coarse.train(train_set)?;

        let residuals = self.residuals_of(train_set)?;
        debug!("training product quantizer on residuals");
        self.pq.train(&residuals)?;

        self.dim = dim;
        self.state = State::Trained;
        info!(
            "ivfadc trained: {} cells, {} x {} codewords, dim {dim}",
            self.coarse.num_cells(),
            self.pq.num_subquantizers(),
            self.pq.num_centroids()
        );
        Ok(())
    }

    /// Insert every row of `base`, assigning consecutive original ids in
    /// row order starting from the count of previously inserted vectors.
    ///
    /// The batch is atomic: nothing is appended until every row has been
    /// assigned and encoded. An empty batch is a no-op that still marks
    /// the index populated.
    pub fn add(&mut self, base: &Matrix) -> Result<()> {
        if self.state == State::Untrained {
            return Err(IndexError::invalid_state("add on an untrained index"));
        }
        let n = base.rows();
        if n > 0 && base.dim() != self.dim {
            return Err(IndexError::invalid_argument(format!(
                "base vectors have width {}, index was trained on width {}",
                base.dim(),
                self.dim
            )));
        }

        if n > 0 {
            let cells = self.coarse.assign_many(base)?;
            let residuals = self.residuals_with(base, &cells)?;
            let codes = self.pq.encode_many(&residuals)?;

            let m = self.pq.num_subquantizers();
            for (i, &cell) in cells.iter().enumerate() {
                self.lists
                    .append(cell, self.next_id + i as u64, &codes[i * m..(i + 1) * m]);
            }
            self.next_id += n as u64;
            info!("ivfadc populated with {n} vectors ({} total)", self.next_id);
        }

        self.state = State::Populated;
        Ok(())
    }

    /// Top-k approximate nearest neighbors of `q`, probing the `w` coarse
    /// cells nearest to it. Results are sorted ascending by (score, id).
    pub fn search(&self, q: &[f32], k: usize, w: usize) -> Result<Vec<Neighbor>> {
        self.check_search(q.len(), k, w)?;
        self.search_one(q, k, w)
    }

    /// Search every row of `queries`; per-row results are identical to
    /// `search`, gathered in input order.
    pub fn search_many(&self, queries: &Matrix, k: usize, w: usize) -> Result<Vec<Vec<Neighbor>>> {
        if queries.is_empty() {
            self.check_search(self.dim, k, w)?;
            return Ok(Vec::new());
        }
        self.check_search(queries.dim(), k, w)?;
        (0..queries.rows())
            .into_par_iter()
            .map(|i| self.search_one(queries.row(i), k, w))
            .collect()
    }

    fn check_search(&self, query_dim: usize, k: usize, w: usize) -> Result<()> {
        if self.state != State::Populated {
            return Err(IndexError::invalid_state("search on an unpopulated index"));
        }
        if query_dim != self.dim {
            return Err(IndexError::invalid_argument(format!(
                "query has width {query_dim}, index was trained on width {}",
                self.dim
            )));
        }
        if k < 1 {
            return Err(IndexError::invalid_argument("k must be >= 1"));
        }
        if w < 1 || w > self.coarse.num_cells() {
            return Err(IndexError::invalid_argument(format!(
                "w must lie in [1, {}], was {w}",
                self.coarse.num_cells()
            )));
        }
        Ok(())
    }

    fn search_one(&self, q: &[f32], k: usize, w: usize) -> Result<Vec<Neighbor>> {
        let mut top = TopK::new(k);
        for cell in self.coarse.nearest_cells(q, w)? {
            // One table build per probed cell; every code in the cell then
            // costs M lookups.
            let q_residual = sub(q, self.coarse.centroid(cell)?);
            let tables = self.pq.build_tables(&q_residual)?;
            for (id, code) in self.lists.iter_cell(cell) {
                top.push(tables.score(code), id);
            }
        }
        Ok(top.into_sorted())
    }

    /// Data dimension D; zero until trained.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of coarse cells.
    pub fn num_cells(&self) -> usize {
        self.coarse.num_cells()
    }

    /// Total number of indexed vectors.
    pub fn len(&self) -> usize {
        self.lists.total_size()
    }

    /// True when no vector has been indexed.
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Whether training has completed.
    pub fn is_trained(&self) -> bool {
        self.state != State::Untrained
    }

    /// Whether at least one `add` batch (possibly empty) has committed.
    pub fn is_populated(&self) -> bool {
        self.state == State::Populated
    }

    fn residuals_of(&self, x: &Matrix) -> Result<Matrix> {
        let cells = self.coarse.assign_many(x)?;
        self.residuals_with(x, &cells)
    }

    fn residuals_with(&self, x: &Matrix, cells: &[usize]) -> Result<Matrix> {
        let mut residuals = Matrix::with_capacity(x.dim(), x.rows());
        for (row, &cell) in x.iter_rows().zip(cells) {
            residuals.push(&sub(row, self.coarse.centroid(cell)?));
        }
        Ok(residuals)
    }
}
