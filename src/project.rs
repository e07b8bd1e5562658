// src/project.rs

use crate::error::{FixtureError, Result};
use crate::matrix::Matrix;
use crate::pca::PcaModel;
use ndarray::Array2;

/// Projects `data` onto the component basis of `model`.
///
/// Computes `(data - model.mean()) · componentsᵀ`, centering with the means
/// the model was fitted on. `data` may be any matrix with the model's
/// feature count; the result has shape (n_samples, k_components).
///
/// # Errors
/// Returns `FixtureError::DimensionMismatch` if the column count of `data`
/// differs from the model's feature count. Nothing is truncated or padded.
pub fn transform(data: &Matrix, model: &PcaModel) -> Result<Matrix> {
    let n_model_features = model.feature_count();
    if data.ncols() != n_model_features {
        return Err(FixtureError::DimensionMismatch {
            expected: n_model_features,
            actual: data.ncols(),
        });
    }
    if data.nrows() == 0 {
        return Ok(Array2::zeros((0, model.component_count())));
    }

    // Accumulate in f64 so the projection is not the noisiest fixture.
    let centered = data.mapv(|v| v as f64) - &model.mean().mapv(|v| v as f64);
    let components = model.components().mapv(|v| v as f64);
    Ok(centered.dot(&components.t()).mapv(|v| v as f32))
}
