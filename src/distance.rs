//! Squared-Euclidean distance kernels.
//!
//! The index is defined for squared Euclidean distance only; the square
//! root is never taken since it preserves ordering.

/// Squared L2 distance between two equal-length vectors.
#[inline]
#[must_use]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Index and squared distance of the row nearest to `v` among the
/// `dim`-wide rows packed in `rows`.
///
/// Ties break to the lowest row index: a later row wins only with a
/// strictly smaller distance.
#[inline]
#[must_use]
pub fn nearest_row(rows: &[f32], dim: usize, v: &[f32]) -> (usize, f32) {
    debug_assert!(!rows.is_empty());
    debug_assert_eq!(v.len(), dim);

    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, row) in rows.chunks_exact(dim).enumerate() {
        let dist = l2_squared(v, row);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    (best, best_dist)
}

/// Subtract `b` from `a` element-wise into a fresh vector.
#[inline]
#[must_use]
pub fn sub(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b.iter()).map(|(x, y)| x - y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_squared_basic() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((l2_squared(&a, &b) - 2.0).abs() < 1e-6);
        assert_eq!(l2_squared(&a, &a), 0.0);
    }

    #[test]
    fn nearest_row_breaks_ties_low() {
        // Two identical rows: the first one must win.
        let rows = [1.0, 1.0, 1.0, 1.0, 0.0, 0.0];
        let (idx, dist) = nearest_row(&rows, 2, &[1.0, 1.0]);
        assert_eq!(idx, 0);
        assert_eq!(dist, 0.0);

        let (idx, _) = nearest_row(&rows, 2, &[0.1, 0.1]);
        assert_eq!(idx, 2);
    }

    #[test]
    fn sub_is_elementwise() {
        assert_eq!(sub(&[3.0, 5.0], &[1.0, 2.0]), vec![2.0, 3.0]);
    }
}
