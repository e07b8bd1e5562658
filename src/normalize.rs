// src/normalize.rs

use crate::error::{FixtureError, Result};
use crate::matrix::Matrix;
use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// Columns whose range falls below this absolute threshold are centered but not scaled.
pub const NORM_EPSILON: f32 = 1e-4;

/// Summary statistics of one column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnStats {
    pub mean: f32,
    pub min: f32,
    pub max: f32,
    /// `max - min`.
    pub range: f32,
}

impl ColumnStats {
    /// Whether the column is wide enough to be divided by its range.
    pub fn is_scalable(&self) -> bool {
        self.range >= NORM_EPSILON
    }
}

/// Value each column is shifted by before scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormStrategy {
    /// `(x - mean) / range`
    Mean,
    /// `(x - min) / range`, mapping a column into `[0, 1]`.
    MinMax,
}

/// Preprocessing applied to a matrix before PCA.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    None,
    Mean,
    MinMax,
}

impl Normalization {
    /// The centering strategy behind this normalization, if any.
    pub fn strategy(self) -> Option<NormStrategy> {
        match self {
            Normalization::None => None,
            Normalization::Mean => Some(NormStrategy::Mean),
            Normalization::MinMax => Some(NormStrategy::MinMax),
        }
    }

    /// Applies the normalization, computing the column statistics on the fly.
    pub fn apply(self, matrix: &Matrix) -> Result<Matrix> {
        match self.strategy() {
            None => Ok(matrix.clone()),
            Some(strategy) => {
                let stats = compute_stats(matrix)?;
                normalize(matrix, &stats, strategy)
            }
        }
    }
}

/// Computes mean, min, max and range of every column.
///
/// Means are accumulated in f64 and narrowed afterwards.
///
/// # Errors
/// Returns `FixtureError::Input` for a matrix without rows or columns.
pub fn compute_stats(matrix: &Matrix) -> Result<Vec<ColumnStats>> {
    let (row_count, col_count) = matrix.dim();
    if row_count == 0 || col_count == 0 {
        return Err(FixtureError::Input(format!(
            "cannot compute column statistics of a {}x{} matrix.",
            row_count, col_count
        )));
    }

    Ok(matrix
        .axis_iter(Axis(1))
        .map(|column| {
            let mut sum = 0.0f64;
            let mut min = f32::INFINITY;
            let mut max = f32::NEG_INFINITY;
            for &v in column.iter() {
                sum += v as f64;
                min = min.min(v);
                max = max.max(v);
            }
            ColumnStats {
                mean: (sum / row_count as f64) as f32,
                min,
                max,
                range: max - min,
            }
        })
        .collect())
}

/// Produces a new matrix where each column is shifted by its mean or minimum
/// and, if its range is at least `NORM_EPSILON`, divided by that range.
///
/// Near-constant columns stay centered but unscaled; a constant column
/// therefore becomes all zeros.
///
/// # Errors
/// Returns `FixtureError::DimensionMismatch` if `stats` does not cover every column.
pub fn normalize(matrix: &Matrix, stats: &[ColumnStats], strategy: NormStrategy) -> Result<Matrix> {
    if stats.len() != matrix.ncols() {
        return Err(FixtureError::DimensionMismatch {
            expected: stats.len(),
            actual: matrix.ncols(),
        });
    }

    let mut normalized = matrix.clone();
    for (mut column, stat) in normalized.axis_iter_mut(Axis(1)).zip(stats.iter()) {
        let shift = match strategy {
            NormStrategy::Mean => stat.mean,
            NormStrategy::MinMax => stat.min,
        };
        if stat.is_scalable() {
            let range = stat.range;
            column.mapv_inplace(|v| (v - shift) / range);
        } else {
            column.mapv_inplace(|v| v - shift);
        }
    }
    Ok(normalized)
}

/// Mean normalization: `(x - mean) / (max - min)` per column.
pub fn mean_normalization(matrix: &Matrix) -> Result<Matrix> {
    Normalization::Mean.apply(matrix)
}

/// Min-max normalization: `(x - min) / (max - min)` per column.
pub fn min_max_normalization(matrix: &Matrix) -> Result<Matrix> {
    Normalization::MinMax.apply(matrix)
}
