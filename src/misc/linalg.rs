use nalgebra::{Cholesky, DMatrix, DVector, Dyn, SymmetricEigen};

use crate::consts::{PSD_TOL, SYMMETRY_TOL};
use crate::result::{CovarianceError, KdeError, Result};

/// Check that `cov` is a `dims` x `dims` symmetric positive semi-definite
/// matrix.
///
/// Symmetry and non-negativity of the eigenvalues are checked relative to
/// the largest magnitude entry, so tiny round-off from user-side arithmetic
/// is tolerated.
///
/// # Example
///
/// ```
/// use nalgebra::DMatrix;
/// use okde::misc::validate_covariance;
///
/// let good = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
/// assert!(validate_covariance(&good, 2).is_ok());
///
/// // eigenvalues are 3 and -1
/// let bad = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
/// assert!(validate_covariance(&bad, 2).is_err());
/// ```
pub fn validate_covariance(cov: &DMatrix<f64>, dims: usize) -> Result<()> {
    if !cov.is_square() {
        return Err(CovarianceError::NotSquare {
            nrows: cov.nrows(),
            ncols: cov.ncols(),
        }
        .into());
    }

    if cov.nrows() != dims {
        return Err(KdeError::DimensionMismatch {
            expected: dims,
            found: cov.nrows(),
        });
    }

    if cov.iter().any(|x| !x.is_finite()) {
        return Err(CovarianceError::NotFinite.into());
    }

    let scale = cov.iter().fold(1.0_f64, |acc, x| acc.max(x.abs()));
    for row in 0..dims {
        for col in (row + 1)..dims {
            let diff = (cov[(row, col)] - cov[(col, row)]).abs();
            if diff > SYMMETRY_TOL * scale {
                return Err(CovarianceError::NotSymmetric { row, col }.into());
            }
        }
    }

    let eigenvalues = cov.symmetric_eigenvalues();
    let min_eig = eigenvalues.iter().fold(f64::INFINITY, |acc, &x| acc.min(x));
    if min_eig < -PSD_TOL * scale {
        Err(CovarianceError::NegativeEigenvalue {
            eigenvalue: min_eig,
        }
        .into())
    } else {
        Ok(())
    }
}

/// Replace `m` with (m + mᵀ) / 2
pub fn symmetrize(m: &mut DMatrix<f64>) {
    let n = m.nrows();
    for row in 0..n {
        for col in (row + 1)..n {
            let avg = 0.5 * (m[(row, col)] + m[(col, row)]);
            m[(row, col)] = avg;
            m[(col, row)] = avg;
        }
    }
}

/// Outer product x xᵀ
#[inline]
pub fn outer(x: &DVector<f64>) -> DMatrix<f64> {
    x * x.transpose()
}

/// Cholesky factorization that reports failure as a `NumericInstability`
/// tagged with `operation`.
pub fn cholesky(
    m: DMatrix<f64>,
    operation: &'static str,
) -> Result<Cholesky<f64, Dyn>> {
    if m.iter().any(|x| !x.is_finite()) {
        return Err(KdeError::unstable(operation));
    }
    Cholesky::new(m).ok_or_else(|| KdeError::unstable(operation))
}

/// ln |Σ| from the Cholesky factor of Σ
#[inline]
pub fn ln_det(chol: &Cholesky<f64, Dyn>) -> f64 {
    2.0 * chol.l_dirty().diagonal().iter().map(|x| x.ln()).sum::<f64>()
}

/// Raise every eigenvalue of the symmetric matrix `m` below `floor` to
/// `floor`. Returns the (possibly unchanged) matrix and whether any
/// eigenvalue was raised.
pub fn clamp_eigenvalues(
    m: DMatrix<f64>,
    floor: f64,
) -> Result<(DMatrix<f64>, bool)> {
    if m.iter().any(|x| !x.is_finite()) {
        return Err(KdeError::unstable("eigen-decomposition of bandwidth"));
    }

    let mut eig = SymmetricEigen::new(m.clone());
    if eig.eigenvalues.iter().all(|&x| x >= floor) {
        return Ok((m, false));
    }

    eig.eigenvalues.iter_mut().for_each(|x| *x = x.max(floor));
    let mut clamped = eig.recompose();
    symmetrize(&mut clamped);
    Ok((clamped, true))
}
