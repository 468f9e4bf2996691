//! Online estimation sessions
use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::compress::CompressionReport;
use crate::config::SessionConfig;
use crate::dist::Mixture;
use crate::result::Result;
use crate::update::{Sample, Updater};

/// An online kernel density estimate of a D-dimensional distribution.
///
/// A session owns one sample model. Samples are folded in with
/// [`update`](Session::update) and never revisited; the model is kept small
/// by compression. The density may be queried at any time.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use okde::session::Session;
///
/// let mut session = Session::new(2, 1.0, 0.02).unwrap();
///
/// session.observe(DVector::from_column_slice(&[3.0, 2.0])).unwrap();
/// session.observe(DVector::from_column_slice(&[7.0, 4.0])).unwrap();
/// session.observe(DVector::from_column_slice(&[3.0, 8.0])).unwrap();
///
/// let near = session.evaluate(&DVector::from_column_slice(&[3.0, 2.0])).unwrap();
/// let far = session.evaluate(&DVector::from_column_slice(&[50.0, 50.0])).unwrap();
/// assert!(near > far);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    config: SessionConfig,
    mixture: Mixture,
    updater: Updater,
}

impl Session {
    /// A session over `dims`-dimensional data with the given forgetting
    /// factor and compression threshold. Everything else takes its default.
    pub fn new(
        dims: usize,
        forgetting_factor: f64,
        compression_threshold: f64,
    ) -> Result<Self> {
        let config = SessionConfig::new(forgetting_factor, compression_threshold)?;
        Self::with_config(dims, config)
    }

    pub fn with_config(dims: usize, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let mixture = Mixture::sample_model(dims)?;
        let updater = Updater::new(&config);
        Ok(Session {
            config,
            mixture,
            updater,
        })
    }

    #[inline]
    pub fn dims(&self) -> usize {
        self.mixture.dims()
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The current sample model
    #[inline]
    pub fn mixture(&self) -> &Mixture {
        &self.mixture
    }

    /// The current bandwidth, `None` before the first update
    #[inline]
    pub fn bandwidth(&self) -> Option<&DMatrix<f64>> {
        self.mixture.bandwidth()
    }

    /// Number of successful updates
    #[inline]
    pub fn n_updates(&self) -> usize {
        self.updater.n_updates()
    }

    /// Fold a batch of samples into the estimate.
    ///
    /// Nothing changes if any sample is invalid.
    ///
    /// A batch that triggers a compression which then fails is still
    /// ingested: the error is returned, the samples stay in the
    /// (uncompressed) model and [`n_updates`](Session::n_updates) counts the
    /// update. Do not resubmit the batch after such an error; call
    /// [`compress`](Session::compress) to retry the compression instead.
    pub fn update(&mut self, samples: &[Sample]) -> Result<()> {
        if let Some(report) = self.updater.update(&mut self.mixture, samples)? {
            debug!(
                "update {} compressed {} -> {} components",
                self.updater.n_updates(),
                report.before,
                report.after
            );
        }
        Ok(())
    }

    /// Fold in a single unit-weight point
    pub fn observe(&mut self, point: DVector<f64>) -> Result<()> {
        self.update(&[Sample::new(point)])
    }

    /// Compress the model now, regardless of the triggers
    pub fn compress(&mut self) -> Result<CompressionReport> {
        self.updater.compressor().compress(&mut self.mixture)
    }

    /// Density of the estimate at `point`
    pub fn evaluate(&self, point: &DVector<f64>) -> Result<f64> {
        self.mixture.evaluate(point)
    }

    /// Density of the estimate at each of `points`
    pub fn evaluate_grid(&self, points: &[DVector<f64>]) -> Result<Vec<f64>> {
        points.iter().map(|x| self.mixture.evaluate(x)).collect()
    }

    /// Log density of the estimate at `point`
    pub fn ln_evaluate(&self, point: &DVector<f64>) -> Result<f64> {
        self.mixture.ln_evaluate(point)
    }

    /// Smallest squared Mahalanobis distance from `point` to a component
    pub fn min_mahalanobis(&self, point: &DVector<f64>) -> Result<f64> {
        self.mixture.min_mahalanobis(point)
    }

    /// The estimate marginalized onto the dimensions in `indices`
    pub fn marginal(&self, indices: &[usize]) -> Result<Mixture> {
        self.mixture.marginal(indices)
    }

    /// An evaluation-only copy of the current estimate
    pub fn snapshot(&self) -> Mixture {
        self.mixture.snapshot()
    }
}
