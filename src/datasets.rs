// src/datasets.rs

use crate::error::{FixtureError, Result};
use crate::matrix::Matrix;
use ndarray::{array, concatenate, Array2, Axis};
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};

/// The 6 x 2 example from the scikit-learn PCA documentation.
///
/// Its first principal axis is roughly `(0.84, 0.54)`; the first row projects
/// to about `(1.38, 0.29)` up to sign.
pub fn sklearn_example() -> Matrix {
    array![
        [-1.0, -1.0],
        [-2.0, -1.0],
        [-3.0, -2.0],
        [1.0, 1.0],
        [2.0, 1.0],
        [3.0, 2.0]
    ]
}

/// Small 6 x 3 matrix with three well separated variances.
pub fn toy() -> Matrix {
    array![
        [1.0, 1.0, 3.0],
        [2.0, 1.0, 4.0],
        [-3.0, 2.0, 0.0],
        [0.1, 0.5, 0.8],
        [2.0, 1.0, 1.0],
        [4.0, 2.0, 3.0]
    ]
}

/// Settings for [`gaussian_blobs`].
#[derive(Clone, Debug)]
pub struct BlobConfig {
    /// Points sampled around each center.
    pub points_per_blob: usize,
    /// Number of varying dimensions.
    pub dims: usize,
    /// Number of cluster centers.
    pub blobs: usize,
    /// Standard deviation of every blob.
    pub spread: f32,
    /// Appends a column holding this value in every row.
    pub constant_column: Option<f32>,
    pub seed: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        BlobConfig {
            points_per_blob: 50,
            dims: 8,
            blobs: 3,
            spread: 1.0,
            constant_column: Some(0.0),
            seed: 2025,
        }
    }
}

/// Deterministic clustered data, a stand-in for small labelled datasets.
///
/// Centers are drawn uniformly from `[-10, 10)` per dimension and each point
/// adds isotropic Gaussian noise. The same config always yields the same matrix.
///
/// # Errors
/// Returns `FixtureError::Input` if any count is zero or the spread is not a
/// positive finite number.
pub fn gaussian_blobs(config: &BlobConfig) -> Result<Matrix> {
    if config.points_per_blob == 0 || config.dims == 0 || config.blobs == 0 {
        return Err(FixtureError::Input(format!(
            "blob dataset needs positive sizes, got {} points x {} dims x {} blobs.",
            config.points_per_blob, config.dims, config.blobs
        )));
    }
    if !(config.spread > 0.0 && config.spread.is_finite()) {
        return Err(FixtureError::Input(format!("blob spread must be positive, got {}.", config.spread)));
    }
    let noise = Normal::new(0.0f32, config.spread)
        .map_err(|e| FixtureError::Input(format!("invalid blob spread {}: {}", config.spread, e)))?;

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let centers = Array2::random_using((config.blobs, config.dims), Uniform::new(-10.0f32, 10.0), &mut rng);

    let n_rows = config.points_per_blob * config.blobs;
    let mut data = Array2::<f32>::zeros((n_rows, config.dims));
    for (row_idx, mut row) in data.axis_iter_mut(Axis(0)).enumerate() {
        let center = centers.row(row_idx / config.points_per_blob);
        for (value, &c) in row.iter_mut().zip(center.iter()) {
            *value = c + noise.sample(&mut rng);
        }
    }

    match config.constant_column {
        Some(value) => {
            let constant = Array2::from_elem((n_rows, 1), value);
            concatenate(Axis(1), &[data.view(), constant.view()])
                .map_err(|e| FixtureError::Input(format!("failed to append constant column: {}", e)))
        }
        None => Ok(data),
    }
}
