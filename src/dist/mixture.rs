use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::consts::WEIGHT_SUM_TOL;
use crate::dist::GaussianComponent;
use crate::misc::{logsumexp, pflip};
use crate::result::{KdeError, Result};
use crate::traits::*;

/// Running state of an updatable sample model
#[derive(Debug, Clone, PartialEq)]
pub struct SampleState {
    /// Sum of the decayed absolute sample weights the normalized component
    /// weights are relative to
    pub(crate) mass: f64,
    /// Decayed count of observations
    pub(crate) n_eff: f64,
    /// Kernel covariance currently added to every component
    pub(crate) bandwidth: Option<DMatrix<f64>>,
}

impl SampleState {
    fn new() -> Self {
        SampleState {
            mass: 0.0,
            n_eff: 0.0,
            bandwidth: None,
        }
    }

    /// Total (decayed) sample mass
    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Effective number of observations
    #[inline]
    pub fn n_eff(&self) -> f64 {
        self.n_eff
    }

    /// Current bandwidth; `None` until the first update
    #[inline]
    pub fn bandwidth(&self) -> Option<&DMatrix<f64>> {
        self.bandwidth.as_ref()
    }
}

/// What a mixture represents
#[derive(Debug, Clone, PartialEq)]
pub enum MixtureKind {
    /// The full sample model of an estimation session. Can be updated and
    /// compressed.
    Sample(SampleState),
    /// A read-only shape for evaluation: snapshots, marginals and mixtures
    /// assembled by the caller.
    Evaluation,
}

/// [Mixture distribution](https://en.wikipedia.org/wiki/Mixture_model)
/// Σ wᵢ 𝒩(μᵢ, Σᵢ) over D-dimensional real vectors.
///
/// Components are held in a flat arena in a stable order. Weights are
/// stored on the components and sum to one whenever control returns to the
/// caller.
///
/// # Example
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use okde::dist::{GaussianComponent, Mixture};
///
/// let components = vec![
///     GaussianComponent::new(
///         1.0,
///         DVector::from_column_slice(&[-2.0]),
///         DMatrix::identity(1, 1),
///     ).unwrap(),
///     GaussianComponent::new(
///         3.0,
///         DVector::from_column_slice(&[2.0]),
///         DMatrix::identity(1, 1),
///     ).unwrap(),
/// ];
///
/// // weights are normalized on construction
/// let mm = Mixture::new(components).unwrap();
/// assert!((mm.weights()[0] - 0.25).abs() < 1E-12);
///
/// let x = DVector::from_column_slice(&[2.0]);
/// assert!(mm.evaluate(&x).unwrap() > 0.29);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Mixture {
    dims: usize,
    kind: MixtureKind,
    components: Vec<GaussianComponent>,
}

impl Mixture {
    /// An empty, updatable sample model in `dims` dimensions
    pub fn sample_model(dims: usize) -> Result<Self> {
        if dims == 0 {
            Err(KdeError::ZeroDimensions)
        } else {
            Ok(Mixture {
                dims,
                kind: MixtureKind::Sample(SampleState::new()),
                components: Vec::new(),
            })
        }
    }

    /// An evaluation mixture from weighted components. Weights are
    /// normalized to sum to one.
    pub fn new(components: Vec<GaussianComponent>) -> Result<Self> {
        let dims = components
            .first()
            .map(|cpnt| cpnt.ndims())
            .ok_or(KdeError::EmptyInput)?;

        if let Some(bad) = components.iter().find(|cpnt| cpnt.ndims() != dims)
        {
            return Err(KdeError::DimensionMismatch {
                expected: dims,
                found: bad.ndims(),
            });
        }

        let total: f64 = components.iter().map(|cpnt| cpnt.weight()).sum();
        if !(total > 0.0 && total.is_finite()) {
            return Err(KdeError::InvalidWeight { weight: total });
        }

        let mut mm = Mixture {
            dims,
            kind: MixtureKind::Evaluation,
            components,
        };
        mm.normalize();
        Ok(mm)
    }

    /// An evaluation mixture in which every component has the same weight
    pub fn uniform(mut components: Vec<GaussianComponent>) -> Result<Self> {
        components.iter_mut().for_each(|cpnt| cpnt.set_weight(1.0));
        Mixture::new(components)
    }

    /// Number of dimensions
    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of components
    #[inline]
    pub fn k(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    #[inline]
    pub fn kind(&self) -> &MixtureKind {
        &self.kind
    }

    /// `true` if this mixture can be updated
    #[inline]
    pub fn is_sample_model(&self) -> bool {
        matches!(self.kind, MixtureKind::Sample(_))
    }

    /// The running state, if this is a sample model
    #[inline]
    pub fn sample_state(&self) -> Option<&SampleState> {
        match &self.kind {
            MixtureKind::Sample(state) => Some(state),
            MixtureKind::Evaluation => None,
        }
    }

    #[inline]
    pub(crate) fn sample_state_mut(&mut self) -> Result<&mut SampleState> {
        match &mut self.kind {
            MixtureKind::Sample(state) => Ok(state),
            MixtureKind::Evaluation => Err(KdeError::EvaluationOnly),
        }
    }

    /// Current bandwidth of a sample model
    #[inline]
    pub fn bandwidth(&self) -> Option<&DMatrix<f64>> {
        self.sample_state().and_then(|state| state.bandwidth())
    }

    #[inline]
    pub fn components(&self) -> &[GaussianComponent] {
        &self.components
    }

    #[inline]
    pub(crate) fn components_mut(&mut self) -> &mut Vec<GaussianComponent> {
        &mut self.components
    }

    /// The component weights in component order
    pub fn weights(&self) -> Vec<f64> {
        self.components.iter().map(|cpnt| cpnt.weight()).collect()
    }

    /// Sum of the component weights
    pub fn total_weight(&self) -> f64 {
        self.components.iter().map(|cpnt| cpnt.weight()).sum()
    }

    /// Scale the weights to sum to one. A no-op on an empty mixture.
    pub(crate) fn normalize(&mut self) {
        let total = self.total_weight();
        if total > 0.0 && (total - 1.0).abs() > f64::EPSILON {
            self.components
                .iter_mut()
                .for_each(|cpnt| cpnt.set_weight(cpnt.weight() / total));
        }
        debug_assert!(
            self.is_empty() || (self.total_weight() - 1.0).abs() < WEIGHT_SUM_TOL
        );
    }

    fn check_point(&self, x: &DVector<f64>) -> Result<()> {
        if x.len() != self.dims {
            Err(KdeError::DimensionMismatch {
                expected: self.dims,
                found: x.len(),
            })
        } else if x.iter().any(|xi| !xi.is_finite()) {
            Err(KdeError::NonFinitePoint)
        } else if self.is_empty() {
            Err(KdeError::EmptyDistribution)
        } else {
            Ok(())
        }
    }

    /// Density of the mixture at `x`, Σ wᵢ 𝒩(x; μᵢ, Σᵢ)
    pub fn evaluate(&self, x: &DVector<f64>) -> Result<f64> {
        self.check_point(x)?;
        Ok(self.f(x))
    }

    /// Log density of the mixture at `x`
    pub fn ln_evaluate(&self, x: &DVector<f64>) -> Result<f64> {
        self.check_point(x)?;
        Ok(self.ln_f(x))
    }

    /// The smallest squared Mahalanobis distance from `x` to any component.
    /// Large values flag `x` as an outlier with respect to the model.
    pub fn min_mahalanobis(&self, x: &DVector<f64>) -> Result<f64> {
        self.check_point(x)?;
        Ok(self
            .components
            .iter()
            .map(|cpnt| cpnt.mahalanobis_sq(x))
            .fold(f64::INFINITY, f64::min))
    }

    /// The marginal mixture over the dimensions in `indices`, in that order.
    /// The result is evaluation-only.
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::{DMatrix, DVector};
    /// use okde::dist::{GaussianComponent, Mixture};
    /// use okde::traits::*;
    ///
    /// let cpnt = GaussianComponent::new(
    ///     1.0,
    ///     DVector::from_column_slice(&[1.0, 2.0, 3.0]),
    ///     DMatrix::identity(3, 3),
    /// ).unwrap();
    /// let mm = Mixture::new(vec![cpnt]).unwrap();
    ///
    /// let marg = mm.marginal(&[2]).unwrap();
    /// assert_eq!(marg.dims(), 1);
    /// assert_eq!(marg.mean().unwrap()[0], 3.0);
    /// ```
    pub fn marginal(&self, indices: &[usize]) -> Result<Mixture> {
        if indices.is_empty() {
            return Err(KdeError::ZeroDimensions);
        }
        for (pos, &index) in indices.iter().enumerate() {
            if index >= self.dims || indices[..pos].contains(&index) {
                return Err(KdeError::InvalidDimensionIndex {
                    index,
                    dims: self.dims,
                });
            }
        }
        if self.is_empty() {
            return Err(KdeError::EmptyDistribution);
        }

        let components = self
            .components
            .iter()
            .map(|cpnt| cpnt.marginal(indices))
            .collect::<Result<Vec<_>>>()?;

        Ok(Mixture {
            dims: indices.len(),
            kind: MixtureKind::Evaluation,
            components,
        })
    }

    /// An evaluation-only copy of the current state
    pub fn snapshot(&self) -> Mixture {
        Mixture {
            dims: self.dims,
            kind: MixtureKind::Evaluation,
            components: self.components.clone(),
        }
    }

    /// The whole mixture collapsed into one moment-matched component
    fn collapse(&self) -> Option<GaussianComponent> {
        let parts: Vec<&GaussianComponent> = self.components.iter().collect();
        GaussianComponent::merge(&parts).ok()
    }
}

impl HasDensity<DVector<f64>> for Mixture {
    fn ln_f(&self, x: &DVector<f64>) -> f64 {
        let lfs: Vec<f64> = self
            .components
            .iter()
            .map(|cpnt| cpnt.weight().ln() + cpnt.ln_f(x))
            .collect();

        if lfs.is_empty() {
            f64::NEG_INFINITY
        } else {
            logsumexp(&lfs)
        }
    }

    fn f(&self, x: &DVector<f64>) -> f64 {
        self.components
            .iter()
            .fold(0.0, |acc, cpnt| cpnt.weight().mul_add(cpnt.f(x), acc))
    }
}

impl Sampleable<DVector<f64>> for Mixture {
    /// # Panics
    /// If the mixture has no components
    fn draw<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        let k = pflip(&self.weights(), rng);
        self.components[k].draw(rng)
    }

    fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<DVector<f64>> {
        let weights = self.weights();
        (0..n)
            .map(|_| {
                let k = pflip(&weights, rng);
                self.components[k].draw(rng)
            })
            .collect()
    }
}

impl Support<DVector<f64>> for Mixture {
    fn supports(&self, x: &DVector<f64>) -> bool {
        self.components.iter().any(|cpnt| cpnt.supports(x))
    }
}

impl ContinuousDistr<DVector<f64>> for Mixture {}

impl Mean<DVector<f64>> for Mixture {
    fn mean(&self) -> Option<DVector<f64>> {
        self.collapse().map(|cpnt| cpnt.mu().clone())
    }
}

impl Variance<DMatrix<f64>> for Mixture {
    fn variance(&self) -> Option<DMatrix<f64>> {
        self.collapse().map(|cpnt| cpnt.cov().clone())
    }
}
