// src/linalg_backends.rs

use ndarray::{Array1, Array2};
use ndarray_linalg::{Eigh as NdLinalgEigh, SVDInto as NdLinalgSVDInto, UPLO};
use std::error::Error;

/// Boxed error coming out of a decomposition backend.
pub type BackendError = Box<dyn Error + Send + Sync>;

/// Output of a symmetric eigendecomposition.
#[derive(Debug)]
pub struct EighOutput<F: 'static> {
    /// Eigenvalues in ascending order, as LAPACK returns them.
    pub eigenvalues: Array1<F>,
    /// Eigenvectors as columns of the matrix.
    /// eigenvectors.column(i) corresponds to eigenvalues[i].
    pub eigenvectors: Array2<F>,
}

/// Trait for symmetric eigendecomposition (LAPACK `?syevd` family).
/// Implementers expect `matrix` to be symmetric and only read its upper triangle.
pub trait BackendEigh<F: 'static + Copy + Send + Sync> {
    fn eigh_upper(&self, matrix: &Array2<F>) -> Result<EighOutput<F>, BackendError>;
}

/// Output of a Singular Value Decomposition.
#[derive(Debug)]
pub struct SVDOutput<F: 'static> {
    pub u: Option<Array2<F>>,
    /// Singular values in descending order.
    pub s: Array1<F>,
    pub vt: Option<Array2<F>>,
}

/// Trait for Singular Value Decomposition.
pub trait BackendSVD<F: 'static + Copy + Send + Sync> {
    fn svd_into(&self, matrix: Array2<F>, compute_u: bool, compute_v: bool) -> Result<SVDOutput<F>, BackendError>;
}

/// LAPACK-backed decompositions through `ndarray-linalg`.
///
/// Which LAPACK gets linked is decided by the `backend_*` cargo features.
#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

fn to_dyn_error<E: Error + Send + Sync + 'static>(e: E) -> BackendError {
    Box::new(e)
}

impl BackendEigh<f64> for NdarrayLinAlgBackend {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput<f64>, BackendError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(format!(
                "eigendecomposition needs a square matrix, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )
            .into());
        }
        let (eigenvalues, eigenvectors) = matrix.eigh(UPLO::Upper).map_err(to_dyn_error)?;
        Ok(EighOutput { eigenvalues, eigenvectors })
    }
}

impl BackendSVD<f64> for NdarrayLinAlgBackend {
    fn svd_into(&self, matrix: Array2<f64>, compute_u: bool, compute_v: bool) -> Result<SVDOutput<f64>, BackendError> {
        let (u, s, vt) = matrix.svd_into(compute_u, compute_v).map_err(to_dyn_error)?;
        Ok(SVDOutput { u, s, vt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn eigh_of_diagonal_is_ascending() {
        let m = array![[3.0, 0.0], [0.0, 1.0]];
        let out = NdarrayLinAlgBackend.eigh_upper(&m).unwrap();
        assert_abs_diff_eq!(out.eigenvalues[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.eigenvalues[1], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.eigenvectors[[0, 1]].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn eigh_rejects_rectangular() {
        assert!(NdarrayLinAlgBackend.eigh_upper(&Array2::<f64>::zeros((2, 3))).is_err());
    }

    #[test]
    fn svd_values_descend() {
        let m = array![[0.0, 2.0], [1.0, 0.0], [0.0, 0.0]];
        let out = NdarrayLinAlgBackend.svd_into(m, false, true).unwrap();
        assert!(out.u.is_none());
        assert_eq!(out.vt.as_ref().map(|v| v.dim()), Some((2, 2)));
        assert_abs_diff_eq!(out.s[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.s[1], 1.0, epsilon = 1e-12);
    }
}
