use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::consts::HALF_LN_2PI;
use crate::misc::{cholesky, ln_det, outer, symmetrize, validate_covariance};
use crate::result::{KdeError, Result};
use crate::traits::*;

/// A weighted [multivariate
/// Gaussian](https://en.wikipedia.org/wiki/Multivariate_normal_distribution),
/// w 𝒩(μ, Σ), as held by a mixture.
///
/// Besides the covariance Σ, a component remembers its *sample covariance*:
/// the part of Σ contributed by the observations themselves (a supplied
/// per-sample covariance, or the spread of merged observations) before
/// kernel broadening. For components of a sample model
/// Σ = sample covariance + bandwidth.
///
/// The Cholesky factor and log determinant of Σ are cached and refreshed on
/// every mutation.
///
/// # Example
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use okde::dist::GaussianComponent;
/// use okde::traits::*;
///
/// let cpnt = GaussianComponent::new(
///     0.5,
///     DVector::from_column_slice(&[1.0, 2.0]),
///     DMatrix::identity(2, 2),
/// ).unwrap();
///
/// // The density peaks at the mean
/// let at_mean = cpnt.f(cpnt.mu());
/// let off_mean = cpnt.f(&DVector::from_column_slice(&[1.5, 2.0]));
/// assert!(at_mean > off_mean);
///
/// // and is 1 / 2π for a standard 2D Gaussian
/// assert!((at_mean - 1.0 / (2.0 * std::f64::consts::PI)).abs() < 1E-12);
/// ```
#[derive(Debug, Clone)]
pub struct GaussianComponent {
    /// Mixture weight, w ≥ 0
    weight: f64,
    /// Mean vector, μ
    mu: DVector<f64>,
    /// Covariance of the observations before kernel broadening
    sample_cov: DMatrix<f64>,
    /// Covariance matrix, Σ
    cov: DMatrix<f64>,
    /// Cholesky factor of Σ
    cov_chol: Cholesky<f64, Dyn>,
    /// ln |Σ|
    ln_det: f64,
}

impl PartialEq for GaussianComponent {
    fn eq(&self, other: &GaussianComponent) -> bool {
        self.weight == other.weight
            && self.mu == other.mu
            && self.cov == other.cov
            && self.sample_cov == other.sample_cov
    }
}

fn check_weight(weight: f64) -> Result<()> {
    if weight >= 0.0 && weight.is_finite() {
        Ok(())
    } else {
        Err(KdeError::InvalidWeight { weight })
    }
}

impl GaussianComponent {
    /// Create a new component whose sample covariance is `cov`.
    ///
    /// `cov` must be symmetric positive definite: semi-definite matrices
    /// pass validation but fail the factorization with
    /// `NumericInstability`.
    pub fn new(
        weight: f64,
        mu: DVector<f64>,
        cov: DMatrix<f64>,
    ) -> Result<Self> {
        check_weight(weight)?;
        if mu.is_empty() {
            return Err(KdeError::ZeroDimensions);
        }
        if mu.iter().any(|x| !x.is_finite()) {
            return Err(KdeError::NonFinitePoint);
        }
        validate_covariance(&cov, mu.len())?;
        Self::from_parts(weight, mu, cov.clone(), cov)
    }

    /// Unit-weight standard Gaussian in `dims` dimensions
    pub fn standard(dims: usize) -> Result<Self> {
        Self::new(1.0, DVector::zeros(dims), DMatrix::identity(dims, dims))
    }

    /// Assemble a component from already-validated parts, factoring `cov`.
    pub(crate) fn from_parts(
        weight: f64,
        mu: DVector<f64>,
        sample_cov: DMatrix<f64>,
        cov: DMatrix<f64>,
    ) -> Result<Self> {
        let cov_chol = cholesky(cov.clone(), "Cholesky of component covariance")?;
        let ln_det = ln_det(&cov_chol);
        if !ln_det.is_finite() {
            return Err(KdeError::unstable("log determinant of covariance"));
        }
        Ok(GaussianComponent {
            weight,
            mu,
            sample_cov,
            cov,
            cov_chol,
            ln_det,
        })
    }

    /// A component centered at `mu` whose covariance is `sample_cov`
    /// broadened by the kernel `bandwidth`.
    pub(crate) fn with_bandwidth(
        weight: f64,
        mu: DVector<f64>,
        sample_cov: DMatrix<f64>,
        bandwidth: &DMatrix<f64>,
    ) -> Result<Self> {
        let mut cov = &sample_cov + bandwidth;
        symmetrize(&mut cov);
        Self::from_parts(weight, mu, sample_cov, cov)
    }

    /// Number of dimensions
    #[inline]
    pub fn ndims(&self) -> usize {
        self.mu.len()
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    #[inline]
    pub(crate) fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Get a reference to the mean vector, μ
    #[inline]
    pub fn mu(&self) -> &DVector<f64> {
        &self.mu
    }

    /// Get a reference to the covariance matrix, Σ
    #[inline]
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// Get a reference to the sample covariance (Σ without the kernel)
    #[inline]
    pub fn sample_cov(&self) -> &DMatrix<f64> {
        &self.sample_cov
    }

    /// ln |Σ|
    #[inline]
    pub fn ln_det(&self) -> f64 {
        self.ln_det
    }

    /// Log of the normalizing constant, -0.5 (D ln 2π + ln |Σ|)
    #[inline]
    pub fn ln_normalizer(&self) -> f64 {
        -(self.ndims() as f64).mul_add(HALF_LN_2PI, 0.5 * self.ln_det)
    }

    /// Replace the kernel: Σ = sample covariance + `bandwidth`.
    ///
    /// The component is left untouched if the new covariance cannot be
    /// factored.
    pub(crate) fn rebroaden(&mut self, bandwidth: &DMatrix<f64>) -> Result<()> {
        let mut cov = &self.sample_cov + bandwidth;
        symmetrize(&mut cov);
        let cov_chol = cholesky(cov.clone(), "Cholesky of broadened covariance")?;
        self.ln_det = ln_det(&cov_chol);
        self.cov = cov;
        self.cov_chol = cov_chol;
        Ok(())
    }

    /// Squared Mahalanobis distance of `x` from the mean,
    /// (x - μ)ᵀ Σ⁻¹ (x - μ)
    pub fn mahalanobis_sq(&self, x: &DVector<f64>) -> f64 {
        let diff = x - &self.mu;
        diff.dot(&self.cov_chol.solve(&diff))
    }

    /// Squared Mahalanobis distance between the means of two components
    /// under the sum of their covariances,
    /// (μ₁ - μ₂)ᵀ (Σ₁ + Σ₂)⁻¹ (μ₁ - μ₂)
    pub fn separation_sq(&self, other: &GaussianComponent) -> Result<f64> {
        let sum = &self.cov + &other.cov;
        let chol = cholesky(sum, "Cholesky of pairwise covariance sum")?;
        let diff = &self.mu - &other.mu;
        Ok(diff.dot(&chol.solve(&diff)))
    }

    /// Squared [Hellinger
    /// distance](https://en.wikipedia.org/wiki/Hellinger_distance) between
    /// the (unweighted) densities of two components, in [0, 1].
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::{DMatrix, DVector};
    /// use okde::dist::GaussianComponent;
    ///
    /// let a = GaussianComponent::standard(1).unwrap();
    /// let b = GaussianComponent::new(
    ///     1.0,
    ///     DVector::from_column_slice(&[1.0]),
    ///     DMatrix::identity(1, 1),
    /// ).unwrap();
    ///
    /// let h2 = a.hellinger_sq(&b).unwrap();
    /// assert!((h2 - (1.0 - (-0.125_f64).exp())).abs() < 1E-12);
    /// assert_eq!(a.hellinger_sq(&a).unwrap(), 0.0);
    /// ```
    pub fn hellinger_sq(&self, other: &GaussianComponent) -> Result<f64> {
        let avg = (&self.cov + &other.cov) * 0.5;
        let chol = cholesky(avg, "Cholesky of averaged covariance")?;
        let diff = &self.mu - &other.mu;
        let maha = diff.dot(&chol.solve(&diff));
        let ln_bc = 0.25 * (self.ln_det + other.ln_det)
            - 0.5 * ln_det(&chol)
            - 0.125 * maha;
        let h2 = 1.0 - ln_bc.exp();
        if h2.is_finite() {
            Ok(h2.clamp(0.0, 1.0))
        } else {
            Err(KdeError::unstable("Hellinger distance"))
        }
    }

    /// Merge components into one by moment matching.
    ///
    /// The result has weight w = Σwᵢ, mean μ = Σwᵢμᵢ / w and covariance
    /// Σ = Σwᵢ(Σᵢ + (μᵢ - μ)(μᵢ - μ)ᵀ) / w, so the zeroth, first and second
    /// moments of the union are preserved. The same rule is applied to the
    /// sample covariances.
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::{DMatrix, DVector};
    /// use okde::dist::GaussianComponent;
    ///
    /// let a = GaussianComponent::new(
    ///     0.25,
    ///     DVector::from_column_slice(&[-1.0]),
    ///     DMatrix::identity(1, 1),
    /// ).unwrap();
    /// let b = GaussianComponent::new(
    ///     0.75,
    ///     DVector::from_column_slice(&[1.0]),
    ///     DMatrix::identity(1, 1),
    /// ).unwrap();
    ///
    /// let merged = GaussianComponent::merge(&[&a, &b]).unwrap();
    ///
    /// assert!((merged.weight() - 1.0).abs() < 1E-12);
    /// assert!((merged.mu()[0] - 0.5).abs() < 1E-12);
    /// // 1 + 0.25 * 1.5^2 + 0.75 * 0.5^2
    /// assert!((merged.cov()[(0, 0)] - 1.75).abs() < 1E-12);
    /// ```
    pub fn merge(parts: &[&GaussianComponent]) -> Result<GaussianComponent> {
        let first = parts.first().ok_or(KdeError::EmptyInput)?;
        let dims = first.ndims();
        if let Some(bad) = parts.iter().find(|cpnt| cpnt.ndims() != dims) {
            return Err(KdeError::DimensionMismatch {
                expected: dims,
                found: bad.ndims(),
            });
        }

        let weight: f64 = parts.iter().map(|cpnt| cpnt.weight).sum();
        if !(weight > 0.0 && weight.is_finite()) {
            return Err(KdeError::unstable("merge of zero-weight components"));
        }

        let mu = parts
            .iter()
            .fold(DVector::zeros(dims), |acc, cpnt| acc + &cpnt.mu * cpnt.weight)
            / weight;

        let zeros = DMatrix::<f64>::zeros(dims, dims);
        let (sample_cov, cov) = parts.iter().fold(
            (zeros.clone(), zeros),
            |(sample_acc, cov_acc), cpnt| {
                let spread = outer(&(&cpnt.mu - &mu));
                (
                    sample_acc + (&cpnt.sample_cov + &spread) * cpnt.weight,
                    cov_acc + (&cpnt.cov + &spread) * cpnt.weight,
                )
            },
        );

        let mut sample_cov = sample_cov / weight;
        let mut cov = cov / weight;
        symmetrize(&mut sample_cov);
        symmetrize(&mut cov);

        GaussianComponent::from_parts(weight, mu, sample_cov, cov)
    }

    /// The marginal of this component over the dimensions in `indices`
    /// (in that order). Indices are assumed valid.
    pub(crate) fn marginal(&self, indices: &[usize]) -> Result<Self> {
        let mu = self.mu.select_rows(indices);
        let sample_cov = self.sample_cov.select_rows(indices).select_columns(indices);
        let cov = self.cov.select_rows(indices).select_columns(indices);
        GaussianComponent::from_parts(self.weight, mu, sample_cov, cov)
    }
}

impl HasDensity<DVector<f64>> for GaussianComponent {
    fn ln_f(&self, x: &DVector<f64>) -> f64 {
        self.ln_normalizer() - 0.5 * self.mahalanobis_sq(x)
    }
}

impl Sampleable<DVector<f64>> for GaussianComponent {
    fn draw<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        let dims = self.ndims();
        let z: DVector<f64> = DVector::from_iterator(
            dims,
            (0..dims).map(|_| rng.sample::<f64, _>(StandardNormal)),
        );
        &self.mu + self.cov_chol.l() * z
    }
}

impl Support<DVector<f64>> for GaussianComponent {
    fn supports(&self, x: &DVector<f64>) -> bool {
        x.len() == self.mu.len() && x.iter().all(|v| v.is_finite())
    }
}

impl ContinuousDistr<DVector<f64>> for GaussianComponent {}

impl Mean<DVector<f64>> for GaussianComponent {
    fn mean(&self) -> Option<DVector<f64>> {
        Some(self.mu.clone())
    }
}

impl Variance<DMatrix<f64>> for GaussianComponent {
    fn variance(&self) -> Option<DMatrix<f64>> {
        Some(self.cov.clone())
    }
}
