//! Incremental mixture updates
use std::num::NonZeroUsize;

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::bandwidth::BandwidthEstimator;
use crate::compress::{CompressionReport, Compressor};
use crate::config::SessionConfig;
use crate::dist::{GaussianComponent, Mixture};
use crate::misc::validate_covariance;
use crate::result::{KdeError, Result};

/// A weighted observation, optionally carrying its own uncertainty.
///
/// # Example
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use okde::update::Sample;
///
/// let x = DVector::from_column_slice(&[1.0, 2.0]);
///
/// let plain: Sample = x.clone().into();
/// assert_eq!(plain.weight(), 1.0);
/// assert!(plain.cov().is_none());
///
/// let noisy = Sample::new(x)
///     .with_cov(DMatrix::identity(2, 2) * 0.1)
///     .with_weight(2.0);
/// assert_eq!(noisy.weight(), 2.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    point: DVector<f64>,
    cov: Option<DMatrix<f64>>,
    weight: f64,
}

impl Sample {
    /// A unit-weight point observation
    pub fn new(point: DVector<f64>) -> Self {
        Sample {
            point,
            cov: None,
            weight: 1.0,
        }
    }

    /// Attach a covariance describing the uncertainty of the point
    pub fn with_cov(mut self, cov: DMatrix<f64>) -> Self {
        self.cov = Some(cov);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    #[inline]
    pub fn point(&self) -> &DVector<f64> {
        &self.point
    }

    #[inline]
    pub fn cov(&self) -> Option<&DMatrix<f64>> {
        self.cov.as_ref()
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    fn validate(&self, dims: usize) -> Result<()> {
        if self.point.len() != dims {
            return Err(KdeError::DimensionMismatch {
                expected: dims,
                found: self.point.len(),
            });
        }
        if self.point.iter().any(|x| !x.is_finite()) {
            return Err(KdeError::NonFinitePoint);
        }
        if !(self.weight > 0.0 && self.weight.is_finite()) {
            return Err(KdeError::InvalidWeight {
                weight: self.weight,
            });
        }
        match &self.cov {
            Some(cov) => validate_covariance(cov, dims),
            None => Ok(()),
        }
    }
}

impl From<DVector<f64>> for Sample {
    fn from(point: DVector<f64>) -> Self {
        Sample::new(point)
    }
}

/// Folds batches of samples into a sample model and keeps it compressed.
///
/// Each update
///
/// 1. decays the existing weights by the forgetting factor,
/// 2. removes components whose weight fell below the prune threshold,
/// 3. re-estimates the bandwidth from the existing components and the new
///    samples,
/// 4. re-broadens the existing components with the new bandwidth,
/// 5. appends one component per sample,
/// 6. renormalizes the weights against the tracked total mass,
///
/// and then compresses the mixture if it has outgrown `max_components` or
/// the periodic trigger is due.
#[derive(Debug, Clone, PartialEq)]
pub struct Updater {
    forgetting_factor: f64,
    prune_threshold: f64,
    max_components: usize,
    compress_every: Option<NonZeroUsize>,
    estimator: BandwidthEstimator,
    compressor: Compressor,
    n_updates: usize,
}

impl Updater {
    pub fn new(config: &SessionConfig) -> Self {
        Updater {
            forgetting_factor: config.forgetting_factor(),
            prune_threshold: config.prune_threshold(),
            max_components: config.max_components(),
            compress_every: config.compress_every(),
            estimator: BandwidthEstimator::from_config(config),
            compressor: Compressor::from_config(config),
            n_updates: 0,
        }
    }

    #[inline]
    pub fn estimator(&self) -> &BandwidthEstimator {
        &self.estimator
    }

    #[inline]
    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    /// Number of successfully committed updates
    #[inline]
    pub fn n_updates(&self) -> usize {
        self.n_updates
    }

    /// `true` if a mixture of `k` components is due for compression
    fn should_compress(&self, k: usize) -> bool {
        let periodic = self
            .compress_every
            .map(|n| self.n_updates % n.get() == 0)
            .unwrap_or(false);
        k > self.max_components || periodic
    }

    /// Fold `samples` into `mixture`.
    ///
    /// The batch is validated as a whole before anything changes, and the
    /// update is committed atomically. Returns the compression report if
    /// compression was triggered.
    ///
    /// If the triggered compression fails, the error is returned but the
    /// batch has already been committed: the mixture holds the samples
    /// (uncompressed) and `n_updates` counts the update. Resubmitting the
    /// batch would ingest it twice.
    pub fn update(
        &mut self,
        mixture: &mut Mixture,
        samples: &[Sample],
    ) -> Result<Option<CompressionReport>> {
        let dims = mixture.dims();
        let (mass, n_eff) = mixture
            .sample_state()
            .map(|state| (state.mass(), state.n_eff()))
            .ok_or(KdeError::EvaluationOnly)?;

        if samples.is_empty() {
            return Err(KdeError::EmptyInput);
        }
        samples.iter().try_for_each(|s| s.validate(dims))?;

        let f = self.forgetting_factor;
        let decayed_mass = f * mass;
        let new_mass: f64 = samples.iter().map(|s| s.weight()).sum();
        let provisional_mass = decayed_mass + new_mass;

        // absolute weights of the surviving components
        let kept: Vec<(f64, &GaussianComponent)> = mixture
            .components()
            .iter()
            .map(|cpnt| (cpnt.weight() * decayed_mass, cpnt))
            .filter(|(w, _)| w / provisional_mass >= self.prune_threshold)
            .collect();

        let n_pruned = mixture.k() - kept.len();
        if n_pruned > 0 {
            debug!("pruned {} decayed components", n_pruned);
        }

        let total_mass: f64 =
            kept.iter().map(|(w, _)| w).sum::<f64>() + new_mass;
        let n_eff = f.mul_add(n_eff, samples.len() as f64);

        let parts = kept
            .iter()
            .map(|(w, cpnt)| (*w, cpnt.mu(), Some(cpnt.sample_cov())))
            .chain(samples.iter().map(|s| (s.weight(), s.point(), s.cov())));
        let bandwidth = self.estimator.estimate_from_parts(dims, n_eff, parts)?;

        let mut components = Vec::with_capacity(kept.len() + samples.len());
        for (w, cpnt) in kept {
            let mut cpnt = cpnt.clone();
            cpnt.set_weight(w / total_mass);
            cpnt.rebroaden(&bandwidth)?;
            components.push(cpnt);
        }
        for s in samples {
            let sample_cov = s
                .cov()
                .cloned()
                .unwrap_or_else(|| DMatrix::zeros(dims, dims));
            components.push(GaussianComponent::with_bandwidth(
                s.weight() / total_mass,
                s.point().clone(),
                sample_cov,
                &bandwidth,
            )?);
        }

        // commit
        *mixture.components_mut() = components;
        mixture.normalize();
        let state = mixture.sample_state_mut()?;
        state.mass = total_mass;
        state.n_eff = n_eff;
        state.bandwidth = Some(bandwidth);
        self.n_updates += 1;

        if self.should_compress(mixture.k()) {
            self.compressor.compress(mixture).map(Some)
        } else {
            Ok(None)
        }
    }
}
