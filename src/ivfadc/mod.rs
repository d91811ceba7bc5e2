//! IVFADC: Inverted File with Asymmetric Distance Computation.
//!
//! The index structure from Jégou, Douze, Schmid (2011), "Product
//! Quantization for Nearest Neighbor Search". Two quantizers cascade:
//!
//! 1. A **coarse quantizer** partitions the space into K_c Voronoi cells;
//!    only the cells nearest the query are scanned.
//! 2. A **product quantizer** compresses each vector's *residual* (the
//!    vector minus its coarse centroid) to M bytes.
//!
//! ```text
//! train:   sample ──> coarse k-means ──> residuals ──> PQ codebooks
//! add:     v ──> cell = coarse(v) ──> code = pq(v - centroid[cell])
//!            ──> inverted_lists[cell].append(id, code)
//! search:  q ──> w nearest cells ──> per cell: tables(q - centroid)
//!            ──> scan codes, score = table lookups ──> global top-k
//! ```
//!
//! Distances are squared Euclidean throughout. Residual encoding matters:
//! residuals concentrate near the origin, so the PQ codebooks spend their
//! precision where the data actually lives.
//!
//! The search loop never reconstructs a stored vector. Each probed cell
//! gets one table build (M x K_s squared distances against the query
//! residual), after which every code in the cell costs M lookups and adds.
//!
//! # Lifecycle
//!
//! Uninitialized -> `train` -> Trained -> `add` -> Populated -> `add` /
//! `search` / `save`. `load` yields a Populated index directly, and more
//! vectors may be added to it. Re-training an already-trained index is
//! rejected.
//!
//! # Usage
//!
//! ```rust,ignore
//! use locality::ivfadc::{IvfAdc, IvfAdcParams};
//! use locality::matrix::Matrix;
//!
//! let params = IvfAdcParams {
//!     coarse_centroids: 16,
//!     pq_subquantizers: 4,
//!     pq_centroids: 16,
//!     ..Default::default()
//! };
//!
//! let data = Matrix::from_vec((0..512).map(|i| i as f32).collect(), 8).unwrap();
//! let mut index = IvfAdc::new(params).unwrap();
//! index.train(&data).unwrap();
//! index.add(&data).unwrap();
//!
//! // Probe 4 cells for the 10 nearest neighbors of row 0.
//! let hits = index.search(data.row(0), 10, 4).unwrap();
//! assert_eq!(hits[0].id, 0);
//! ```

mod engine;
mod persist;

pub use engine::{IvfAdc, IvfAdcParams};
