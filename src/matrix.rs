// src/matrix.rs

use crate::error::{FixtureError, Result};
use ndarray::{Array1, Array2, Axis};

/// Dense observation matrix: rows are data points, columns are dimensions.
pub type Matrix = Array2<f32>;

/// Builds a matrix from a flat row-major buffer `[p0d0, p0d1, ..., p1d0, ...]`.
///
/// # Errors
/// Returns `FixtureError::Input` if `col_count` is zero, the buffer is empty,
/// or its length is not a multiple of `col_count`.
pub fn from_row_major(values: Vec<f32>, col_count: usize) -> Result<Matrix> {
    if col_count == 0 {
        return Err(FixtureError::Input("column count must be positive.".into()));
    }
    if values.is_empty() {
        return Err(FixtureError::Input("row-major buffer is empty.".into()));
    }
    if values.len() % col_count != 0 {
        return Err(FixtureError::Input(format!(
            "buffer of {} values cannot be split into rows of {} columns.",
            values.len(),
            col_count
        )));
    }
    let row_count = values.len() / col_count;
    Array2::from_shape_vec((row_count, col_count), values)
        .map_err(|e| FixtureError::Input(format!("failed to shape row-major buffer: {}", e)))
}

/// Flattens a matrix into row-major order, whatever its memory layout.
pub fn to_row_major(matrix: &Matrix) -> Vec<f32> {
    matrix.iter().copied().collect()
}

/// Checks that a matrix can enter the pipeline.
///
/// Missing values are not supported, so any NaN or infinity is rejected here.
pub fn validate(matrix: &Matrix) -> Result<()> {
    let (row_count, col_count) = matrix.dim();
    if row_count == 0 || col_count == 0 {
        return Err(FixtureError::Input(format!(
            "matrix must have at least one row and one column, got {}x{}.",
            row_count, col_count
        )));
    }
    if let Some(pos) = matrix.iter().position(|v| !v.is_finite()) {
        return Err(FixtureError::Input(format!(
            "matrix contains a non-finite value at row {}, column {}.",
            pos / col_count,
            pos % col_count
        )));
    }
    Ok(())
}

/// Keeps only the dimensions whose flag is set, in their original order.
pub fn select_columns(matrix: &Matrix, enabled: &[bool]) -> Result<Matrix> {
    if enabled.len() != matrix.ncols() {
        return Err(FixtureError::Input(format!(
            "dimension mask has {} entries but matrix has {} columns.",
            enabled.len(),
            matrix.ncols()
        )));
    }
    let indices: Vec<usize> = enabled
        .iter()
        .enumerate()
        .filter_map(|(i, &on)| on.then_some(i))
        .collect();
    if indices.is_empty() {
        return Err(FixtureError::Input("no dimension is enabled.".into()));
    }
    Ok(matrix.select(Axis(1), &indices))
}

/// Per-column arithmetic means, accumulated in f64.
pub fn column_means(matrix: &Matrix) -> Array1<f32> {
    let row_count = matrix.nrows().max(1) as f64;
    matrix.map_axis(Axis(0), |column| {
        (column.iter().map(|&v| v as f64).sum::<f64>() / row_count) as f32
    })
}

/// Subtracts `means` from every row.
pub fn center(matrix: &Matrix, means: &Array1<f32>) -> Result<Matrix> {
    if means.len() != matrix.ncols() {
        return Err(FixtureError::DimensionMismatch {
            expected: means.len(),
            actual: matrix.ncols(),
        });
    }
    Ok(matrix - means)
}
