// Principal component analysis (PCA)

use crate::compare::canonical_sign;
use crate::error::{FixtureError, Result};
use crate::linalg_backends::{BackendEigh, BackendSVD, NdarrayLinAlgBackend};
use crate::matrix::{self, Matrix};
use crate::normalize::Normalization;
use crate::project;
use log::{debug, info};
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

/// How the component basis is extracted from the centered data.
///
/// Both strategies produce the same subspace; individual components agree
/// up to sign.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcaAlgorithm {
    /// Eigendecomposition of the `d x d` covariance matrix `XᵀX / (n - 1)`.
    Covariance,
    /// Right singular vectors of the centered matrix itself.
    #[default]
    Svd,
}

impl PcaAlgorithm {
    /// The other strategy, used to cross-check a fit.
    pub fn counterpart(self) -> Self {
        match self {
            PcaAlgorithm::Covariance => PcaAlgorithm::Svd,
            PcaAlgorithm::Svd => PcaAlgorithm::Covariance,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PcaAlgorithm::Covariance => "covariance",
            PcaAlgorithm::Svd => "svd",
        }
    }
}

/// A fitted PCA model.
///
/// Holds the component basis, the column means it was fitted around and the
/// variance captured by each component. The model keeps no reference to the
/// data it was fitted on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PcaModel {
    /// Principal axes, one per row, ordered by descending explained variance.
    /// Shape: (k_components, n_features)
    components: Array2<f32>,
    /// Column means of the training data.
    /// Shape: (n_features)
    mean: Array1<f32>,
    /// Eigenvalues of the covariance matrix for the kept components.
    /// Shape: (k_components)
    explained_variance: Array1<f32>,
    /// Singular values of the centered training data for the kept components.
    /// Shape: (k_components)
    singular_values: Array1<f32>,
    /// Sum of the variances of all features of the training data.
    total_variance: f32,
    algorithm: PcaAlgorithm,
}

/// Decompositions are computed in f64 and narrowed to f32 afterwards.
struct Decomposition {
    /// Unit-norm components, one per row, sorted by descending variance.
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    singular_values: Array1<f64>,
}

impl PcaModel {
    /// Fits a PCA model with `component_count` components.
    ///
    /// The data is mean-centered internally, regardless of any normalization
    /// applied beforehand. The returned components are orthonormal and
    /// ordered by descending explained variance; a fit with fewer components
    /// returns the leading rows of the full fit. Component signs are not
    /// determined by the decomposition, see [`PcaModel::canonicalize_signs`].
    ///
    /// * `data_matrix` - Input data, shape (n_samples, n_features).
    /// * `component_count` - Number of components to keep, `1..=n_features`.
    /// * `algorithm` - Covariance eigendecomposition or SVD.
    ///
    /// # Errors
    /// `FixtureError::Input` if the matrix is empty or not finite.
    /// `FixtureError::Fit` if `component_count` is zero or exceeds the number of
    /// features or samples, if there are fewer than two samples, if the
    /// centered data has rank below `component_count` (judged on its singular
    /// values whichever algorithm is chosen), or if the
    /// decomposition itself fails.
    pub fn fit(data_matrix: &Matrix, component_count: usize, algorithm: PcaAlgorithm) -> Result<Self> {
        matrix::validate(data_matrix)?;
        let (n_samples, n_features) = data_matrix.dim();

        if component_count == 0 {
            return Err(FixtureError::Fit("component count must be at least 1.".into()));
        }
        if component_count > n_features {
            return Err(FixtureError::Fit(format!(
                "requested {} components but the data has only {} features.",
                component_count, n_features
            )));
        }
        if n_samples < 2 {
            return Err(FixtureError::Fit("input matrix must have at least 2 samples.".into()));
        }
        if component_count > n_samples {
            return Err(FixtureError::Fit(format!(
                "requested {} components from only {} samples.",
                component_count, n_samples
            )));
        }

        let start_time = Instant::now();
        let mean = matrix::column_means(data_matrix);
        let mean_f64 = mean.mapv(|v| v as f64);
        let centered = data_matrix.mapv(|v| v as f64) - &mean_f64;
        let total_variance =
            centered.iter().map(|v| v * v).sum::<f64>() / (n_samples - 1) as f64;

        let decomposition = match algorithm {
            PcaAlgorithm::Covariance => {
                // Rank is judged on singular values for both algorithms.
                let singular_values = NdarrayLinAlgBackend
                    .svd_into(centered.clone(), false, false)
                    .map_err(|e| FixtureError::Fit(format!("SVD of centered data failed: {}", e)))?
                    .s;
                check_rank(effective_rank(&singular_values, n_samples, n_features), component_count)?;
                covariance_components(centered, component_count)?
            }
            PcaAlgorithm::Svd => svd_components(centered, component_count)?,
        };
        debug!(
            "{} PCA on {}x{} data kept {} components in {:?}",
            algorithm.name(),
            n_samples,
            n_features,
            component_count,
            start_time.elapsed()
        );

        Ok(Self {
            components: decomposition.components.mapv(|v| v as f32),
            mean,
            explained_variance: decomposition.explained_variance.mapv(|v| v as f32),
            singular_values: decomposition.singular_values.mapv(|v| v as f32),
            total_variance: total_variance as f32,
            algorithm,
        })
    }

    /// Component basis, one component per row. Shape: (k_components, n_features).
    pub fn components(&self) -> &Array2<f32> {
        &self.components
    }

    /// Column means the model was fitted around. Shape: (n_features).
    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }

    /// Variance captured by each component, in descending order.
    pub fn explained_variance(&self) -> &Array1<f32> {
        &self.explained_variance
    }

    /// Fraction of the total variance captured by each component.
    ///
    /// All zeros if the training data had no variance at all.
    pub fn explained_variance_ratio(&self) -> Array1<f32> {
        if self.total_variance > 0.0 {
            self.explained_variance.mapv(|v| v / self.total_variance)
        } else {
            Array1::zeros(self.explained_variance.len())
        }
    }

    /// Singular values of the centered training data for the kept components.
    pub fn singular_values(&self) -> &Array1<f32> {
        &self.singular_values
    }

    pub fn algorithm(&self) -> PcaAlgorithm {
        self.algorithm
    }

    pub fn component_count(&self) -> usize {
        self.components.nrows()
    }

    pub fn feature_count(&self) -> usize {
        self.components.ncols()
    }

    /// Flips every component whose first significant entry is negative.
    pub fn canonicalize_signs(mut self) -> Self {
        for mut component in self.components.axis_iter_mut(Axis(0)) {
            if canonical_sign(component.view()) < 0.0 {
                component.mapv_inplace(|v| -v);
            }
        }
        self
    }

    /// Keeps only the leading `component_count` components.
    pub fn truncate(&self, component_count: usize) -> Result<Self> {
        if component_count == 0 || component_count > self.component_count() {
            return Err(FixtureError::Fit(format!(
                "cannot truncate a {}-component model to {} components.",
                self.component_count(),
                component_count
            )));
        }
        Ok(Self {
            components: self.components.slice(s![..component_count, ..]).to_owned(),
            mean: self.mean.clone(),
            explained_variance: self.explained_variance.slice(s![..component_count]).to_owned(),
            singular_values: self.singular_values.slice(s![..component_count]).to_owned(),
            total_variance: self.total_variance,
            algorithm: self.algorithm,
        })
    }

    /// Saves the model to a file using bincode.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or serialization fails.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| FixtureError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|e| FixtureError::format(path, format!("failed to serialize PCA model: {}", e)))?;
        Ok(())
    }

    /// Loads a model previously written by [`PcaModel::save_model`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or decoded, or if the
    /// decoded model has inconsistent dimensions or non-finite values.
    pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FixtureError::io(path, e))?;
        let mut reader = BufReader::new(file);
        let model: PcaModel = bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
            .map_err(|e| FixtureError::format(path, format!("failed to deserialize PCA model: {}", e)))?;

        let k = model.components.nrows();
        if model.components.ncols() != model.mean.len() {
            return Err(FixtureError::format(
                path,
                format!(
                    "components have {} features but mean has {}.",
                    model.components.ncols(),
                    model.mean.len()
                ),
            ));
        }
        if model.explained_variance.len() != k || model.singular_values.len() != k {
            return Err(FixtureError::format(
                path,
                format!(
                    "{} components but {} variances and {} singular values.",
                    k,
                    model.explained_variance.len(),
                    model.singular_values.len()
                ),
            ));
        }
        let all_finite = model
            .components
            .iter()
            .chain(model.mean.iter())
            .chain(model.explained_variance.iter())
            .all(|v| v.is_finite());
        if !all_finite || !model.total_variance.is_finite() {
            return Err(FixtureError::format(path, "model contains non-finite values."));
        }
        Ok(model)
    }
}

/// Effective rank in the style of `numpy.linalg.matrix_rank`: singular values
/// at or below `largest * max(n, d) * eps` count as zero.
///
/// Always applied to singular values of the centered data, never to
/// eigenvalues of its covariance, so both algorithms agree on it.
fn effective_rank(singular_values: &Array1<f64>, n_samples: usize, n_features: usize) -> usize {
    let largest = singular_values.iter().copied().fold(0.0f64, f64::max);
    let threshold = largest * n_samples.max(n_features) as f64 * f64::EPSILON;
    singular_values.iter().filter(|&&v| v > threshold).count()
}

fn check_rank(rank: usize, component_count: usize) -> Result<()> {
    if rank < component_count {
        return Err(FixtureError::Fit(format!(
            "centered data has rank {} but {} components were requested.",
            rank, component_count
        )));
    }
    Ok(())
}

fn covariance_components(centered: Array2<f64>, component_count: usize) -> Result<Decomposition> {
    let (n_samples, n_features) = centered.dim();
    let mut cov_matrix = centered.t().dot(&centered);
    cov_matrix /= (n_samples - 1) as f64;

    let eig = NdarrayLinAlgBackend
        .eigh_upper(&cov_matrix)
        .map_err(|e| FixtureError::Fit(format!("eigendecomposition of covariance matrix failed: {}", e)))?;

    // LAPACK returns ascending eigenvalues; rank components by descending variance.
    let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| {
        eig.eigenvalues[b]
            .partial_cmp(&eig.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut components = Array2::<f64>::zeros((component_count, n_features));
    let mut explained_variance = Array1::<f64>::zeros(component_count);
    for (row, &idx) in order.iter().take(component_count).enumerate() {
        let eig_vec = eig.eigenvectors.column(idx);
        let norm = eig_vec.dot(&eig_vec).sqrt();
        components.row_mut(row).assign(&eig_vec.mapv(|x| x / norm));
        explained_variance[row] = eig.eigenvalues[idx].max(0.0);
    }
    let singular_values = explained_variance.mapv(|v| (v * (n_samples - 1) as f64).sqrt());

    Ok(Decomposition {
        components,
        explained_variance,
        singular_values,
    })
}

fn svd_components(centered: Array2<f64>, component_count: usize) -> Result<Decomposition> {
    let (n_samples, n_features) = centered.dim();
    let svd = NdarrayLinAlgBackend
        .svd_into(centered, false, true)
        .map_err(|e| FixtureError::Fit(format!("SVD of centered data failed: {}", e)))?;
    let vt = svd
        .vt
        .ok_or_else(|| FixtureError::Fit("SVD did not return right singular vectors.".into()))?;

    check_rank(effective_rank(&svd.s, n_samples, n_features), component_count)?;

    let singular_values = svd.s.slice(s![..component_count]).to_owned();
    let explained_variance = singular_values.mapv(|v| v * v / (n_samples - 1) as f64);
    let components = vt.slice(s![..component_count, ..]).to_owned();

    Ok(Decomposition {
        components,
        explained_variance,
        singular_values,
    })
}

/// Normalizes, fits and projects in one call.
///
/// Returns the projection of the normalized data onto `component_count`
/// components, shape (n_samples, component_count).
pub fn reduce(
    data_matrix: &Matrix,
    component_count: usize,
    algorithm: PcaAlgorithm,
    normalization: Normalization,
) -> Result<Matrix> {
    let start_time = Instant::now();
    let prepared = normalization.apply(data_matrix)?;
    let model = PcaModel::fit(&prepared, component_count, algorithm)?;
    let projection = project::transform(&prepared, &model)?;
    info!(
        "PCA ({}, {:?} normalization) reduced {:?} to {:?} in {:?}",
        algorithm.name(),
        normalization,
        data_matrix.dim(),
        projection.dim(),
        start_time.elapsed()
    );
    Ok(projection)
}
