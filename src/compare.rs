// src/compare.rs
//
// Sign-invariant comparisons of component bases and projections.
// Eigenvector and singular-vector signs are arbitrary, so raw equality
// between two independently fitted models is meaningless.

use float_cmp::approx_eq;
use ndarray::{Array2, ArrayView1, Axis};

/// Entries with a magnitude at or below this are skipped when picking a vector's sign.
pub const SIGN_TOLERANCE: f32 = 1e-6;

/// Returns `-1.0` if the first entry with `|x| > SIGN_TOLERANCE` is negative, `1.0` otherwise.
pub fn canonical_sign(vector: ArrayView1<f32>) -> f32 {
    match vector.iter().find(|v| v.abs() > SIGN_TOLERANCE) {
        Some(&v) if v < 0.0 => -1.0,
        _ => 1.0,
    }
}

/// Copy of `matrix` with every vector laid out along `axis` flipped to canonical sign.
///
/// `Axis(0)` treats rows as vectors (component matrices, k x d);
/// `Axis(1)` treats columns as vectors (projections, n x k).
pub fn canonicalize(matrix: &Array2<f32>, axis: Axis) -> Array2<f32> {
    let mut out = matrix.clone();
    for mut vector in out.axis_iter_mut(axis) {
        if canonical_sign(vector.view()) < 0.0 {
            vector.mapv_inplace(|v| -v);
        }
    }
    out
}

/// Rows are the vectors.
pub fn canonicalize_rows(matrix: &Array2<f32>) -> Array2<f32> {
    canonicalize(matrix, Axis(0))
}

/// Columns are the vectors.
pub fn canonicalize_columns(matrix: &Array2<f32>) -> Array2<f32> {
    canonicalize(matrix, Axis(1))
}

/// Largest element-wise difference between `a` and `b` once each vector
/// along `axis` is allowed to flip sign independently.
///
/// Returns `None` when the shapes differ.
pub fn max_abs_diff_up_to_sign(a: &Array2<f32>, b: &Array2<f32>, axis: Axis) -> Option<f32> {
    if a.shape() != b.shape() {
        return None;
    }
    let worst = a
        .axis_iter(axis)
        .zip(b.axis_iter(axis))
        .map(|(va, vb)| {
            let same = va
                .iter()
                .zip(vb.iter())
                .fold(0.0f32, |acc, (x, y)| acc.max((x - y).abs()));
            let flipped = va
                .iter()
                .zip(vb.iter())
                .fold(0.0f32, |acc, (x, y)| acc.max((x + y).abs()));
            same.min(flipped)
        })
        .fold(0.0f32, f32::max);
    Some(worst)
}

/// True if every vector along `axis` of `a` equals the matching vector of `b`,
/// or its negation, within `tolerance` (absolute, plus a few ulps).
pub fn matches_up_to_sign(a: &Array2<f32>, b: &Array2<f32>, axis: Axis, tolerance: f32) -> bool {
    if a.shape() != b.shape() {
        return false;
    }
    a.axis_iter(axis).zip(b.axis_iter(axis)).all(|(va, vb)| {
        let same = va
            .iter()
            .zip(vb.iter())
            .all(|(&x, &y)| approx_eq!(f32, x, y, epsilon = tolerance, ulps = 4));
        same || va
            .iter()
            .zip(vb.iter())
            .all(|(&x, &y)| approx_eq!(f32, x, -y, epsilon = tolerance, ulps = 4))
    })
}

/// Frobenius norm of `|a| - |b|`. The coarsest sign-blind comparison.
pub fn abs_value_distance(a: &Array2<f32>, b: &Array2<f32>) -> Option<f32> {
    if a.shape() != b.shape() {
        return None;
    }
    let sum_sq: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (x.abs() - y.abs()) as f64;
            d * d
        })
        .sum();
    Some(sum_sq.sqrt() as f32)
}

/// `max |C Cᵀ - I|` for a component matrix with one component per row.
pub fn orthonormality_error(components: &Array2<f32>) -> f32 {
    let c = components.mapv(|v| v as f64);
    let gram = c.dot(&c.t());
    gram.indexed_iter()
        .map(|((i, j), &g)| {
            let target = if i == j { 1.0 } else { 0.0 };
            (g - target).abs()
        })
        .fold(0.0f64, f64::max) as f32
}

/// Whether two component matrices (rows are components) span the same
/// subspace, by comparing their orthogonal projectors `CᵀC`.
///
/// Component order and signs are irrelevant to this check.
pub fn same_subspace(a: &Array2<f32>, b: &Array2<f32>, tolerance: f32) -> bool {
    if a.shape() != b.shape() {
        return false;
    }
    let a64 = a.mapv(|v| v as f64);
    let b64 = b.mapv(|v| v as f64);
    let pa = a64.t().dot(&a64);
    let pb = b64.t().dot(&b64);
    pa.iter()
        .zip(pb.iter())
        .all(|(x, y)| (x - y).abs() <= tolerance as f64)
}
