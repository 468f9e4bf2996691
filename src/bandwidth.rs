//! Kernel bandwidth estimation
use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::config::SessionConfig;
use crate::consts::MIN_BANDWIDTH_PARTS;
use crate::dist::Mixture;
use crate::misc::{clamp_eigenvalues, outer, symmetrize};
use crate::result::{KdeError, Result};

/// Scale applied to the data covariance by the multivariate Silverman rule,
/// (4 / ((D + 2) n))^(2 / (D + 4)).
///
/// # Example
///
/// ```
/// use okde::bandwidth::silverman_scale;
///
/// // In one dimension this is the square of the familiar
/// // (4 / 3n)^(1/5) factor on the standard deviation
/// let n = 100.0_f64;
/// let sd_factor = (4.0 / (3.0 * n)).powf(0.2);
/// assert!((silverman_scale(1, n) - sd_factor * sd_factor).abs() < 1E-12);
/// ```
pub fn silverman_scale(dims: usize, n_eff: f64) -> f64 {
    let d = dims as f64;
    (4.0 / ((d + 2.0) * n_eff)).powf(2.0 / (d + 4.0))
}

/// Estimates the kernel covariance H shared by every component of a sample
/// model.
///
/// The data covariance is the moment-matched covariance of the weighted
/// parts: the spread of their means plus their own sample covariances. It
/// is scaled by [`silverman_scale`] and any eigenvalue below the floor is
/// raised to it, so the result is always positive definite.
#[derive(Debug, Clone, PartialEq)]
pub struct BandwidthEstimator {
    floor: f64,
    default_bandwidth: f64,
}

impl Default for BandwidthEstimator {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl BandwidthEstimator {
    /// An estimator with eigenvalue floor `floor` that falls back to
    /// `default_bandwidth` × I while there are fewer than two parts to
    /// spread.
    pub fn new(floor: f64, default_bandwidth: f64) -> Self {
        BandwidthEstimator {
            floor,
            default_bandwidth,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.bandwidth_floor(), config.default_bandwidth())
    }

    #[inline]
    pub fn floor(&self) -> f64 {
        self.floor
    }

    #[inline]
    pub fn default_bandwidth(&self) -> f64 {
        self.default_bandwidth
    }

    /// Bandwidth for the current contents of `mixture`.
    ///
    /// The effective sample count is the decayed observation count of a
    /// sample model, or the number of components of an evaluation mixture.
    pub fn estimate(&self, mixture: &Mixture) -> Result<DMatrix<f64>> {
        let n_eff = mixture
            .sample_state()
            .map(|state| state.n_eff())
            .unwrap_or(mixture.k() as f64);

        let parts = mixture
            .components()
            .iter()
            .map(|cpnt| (cpnt.weight(), cpnt.mu(), Some(cpnt.sample_cov())));

        self.estimate_from_parts(mixture.dims(), n_eff, parts)
    }

    /// Bandwidth from weighted `(weight, mean, sample covariance)` parts.
    /// A missing sample covariance is a point mass. Weights need not be
    /// normalized.
    pub fn estimate_from_parts<'a, I>(
        &self,
        dims: usize,
        n_eff: f64,
        parts: I,
    ) -> Result<DMatrix<f64>>
    where
        I: IntoIterator<
            Item = (f64, &'a DVector<f64>, Option<&'a DMatrix<f64>>),
        >,
    {
        let parts: Vec<_> = parts.into_iter().collect();
        if parts.is_empty() {
            return Err(KdeError::EmptyDistribution);
        }

        if parts.len() < MIN_BANDWIDTH_PARTS {
            debug!(
                "{} part(s) are too few for a bandwidth estimate; using {} x I",
                parts.len(),
                self.default_bandwidth
            );
            return Ok(DMatrix::identity(dims, dims) * self.default_bandwidth);
        }

        let total: f64 = parts.iter().map(|(w, _, _)| w).sum();
        if !(total > 0.0 && total.is_finite()) {
            return Err(KdeError::unstable("total weight of bandwidth estimate"));
        }

        let mean = parts
            .iter()
            .fold(DVector::zeros(dims), |acc, (w, mu, _)| acc + *mu * *w)
            / total;

        let mut spread = parts.iter().fold(
            DMatrix::zeros(dims, dims),
            |acc, (w, mu, sample_cov)| {
                let between = outer(&(*mu - &mean));
                let within = match sample_cov {
                    Some(cov) => between + *cov,
                    None => between,
                };
                acc + within * *w
            },
        ) / total;
        symmetrize(&mut spread);

        let h = spread * silverman_scale(dims, n_eff);
        if h.iter().any(|x| !x.is_finite()) {
            return Err(KdeError::unstable("bandwidth estimate"));
        }

        let (h, clamped) = clamp_eigenvalues(h, self.floor)?;
        if clamped {
            debug!(
                "bandwidth eigenvalues raised to the floor ({})",
                self.floor
            );
        }
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::GaussianComponent;
    use crate::test_basic_impls;
    use approx::assert_relative_eq;

    const TOL: f64 = 1E-12;

    fn point(xs: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(xs)
    }

    test_basic_impls!(BandwidthEstimator::default());

    #[test]
    fn silverman_scale_shrinks_with_more_data() {
        assert!(silverman_scale(2, 10.0) > silverman_scale(2, 100.0));
        // D = 2: (4 / 4n)^(1/3) = n^(-1/3)
        assert::close(silverman_scale(2, 8.0), 0.5, TOL);
    }

    #[test]
    fn empty_parts_is_an_error() {
        let est = BandwidthEstimator::default();
        let res = est.estimate_from_parts(2, 5.0, std::iter::empty());
        assert_eq!(res, Err(KdeError::EmptyDistribution));
    }

    #[test]
    fn empty_mixture_is_an_error() {
        let est = BandwidthEstimator::default();
        let mm = Mixture::sample_model(2).unwrap();
        assert_eq!(est.estimate(&mm), Err(KdeError::EmptyDistribution));
    }

    #[test]
    fn single_observation_uses_default_bandwidth() {
        let est = BandwidthEstimator::new(1E-9, 0.25);
        let x = point(&[3.0, 2.0]);
        let h = est.estimate_from_parts(2, 1.0, vec![(1.0, &x, None)]).unwrap();
        assert_relative_eq!(h, DMatrix::identity(2, 2) * 0.25, epsilon = TOL);
    }

    #[test]
    fn identical_points_hit_the_floor() {
        let est = BandwidthEstimator::new(1E-6, 0.25);
        let x = point(&[1.0, -1.0]);
        let parts = vec![(1.0, &x, None), (1.0, &x, None), (1.0, &x, None)];
        let h = est.estimate_from_parts(2, 3.0, parts).unwrap();
        assert_relative_eq!(h, DMatrix::identity(2, 2) * 1E-6, epsilon = 1E-15);
    }

    #[test]
    fn two_points_in_one_dimension() {
        let est = BandwidthEstimator::default();
        let a = point(&[-1.0]);
        let b = point(&[1.0]);
        let h = est
            .estimate_from_parts(1, 2.0, vec![(1.0, &a, None), (1.0, &b, None)])
            .unwrap();
        // unit spread scaled by (4 / 6)^(2 / 5)
        assert::close(h[(0, 0)], (2.0_f64 / 3.0).powf(0.4), TOL);
    }

    #[test]
    fn weights_need_not_be_normalized() {
        let est = BandwidthEstimator::default();
        let a = point(&[-1.0]);
        let b = point(&[1.0]);
        let h1 = est
            .estimate_from_parts(1, 4.0, vec![(1.0, &a, None), (3.0, &b, None)])
            .unwrap();
        let h2 = est
            .estimate_from_parts(
                1,
                4.0,
                vec![(0.25, &a, None), (0.75, &b, None)],
            )
            .unwrap();
        assert::close(h1[(0, 0)], h2[(0, 0)], TOL);
        // spread = 4 * 0.25 * 0.75
        assert::close(h1[(0, 0)], 0.75 * silverman_scale(1, 4.0), TOL);
    }

    #[test]
    fn sample_covariances_add_to_the_spread() {
        let est = BandwidthEstimator::default();
        let x = point(&[0.0, 0.0]);
        let cov = DMatrix::identity(2, 2) * 2.0;
        let h = est
            .estimate_from_parts(
                2,
                10.0,
                vec![(1.0, &x, Some(&cov)), (1.0, &x, Some(&cov))],
            )
            .unwrap();
        assert_relative_eq!(
            h,
            DMatrix::identity(2, 2) * (2.0 * silverman_scale(2, 10.0)),
            epsilon = TOL
        );
    }

    #[test]
    fn evaluation_mixture_counts_components() {
        let est = BandwidthEstimator::default();
        let cpnts = vec![
            GaussianComponent::new(
                1.0,
                point(&[-1.0]),
                DMatrix::from_element(1, 1, 0.5),
            )
            .unwrap(),
            GaussianComponent::new(
                1.0,
                point(&[1.0]),
                DMatrix::from_element(1, 1, 0.5),
            )
            .unwrap(),
        ];
        let mm = Mixture::new(cpnts).unwrap();
        let h = est.estimate(&mm).unwrap();
        // 1 between plus 0.5 within, with n = 2
        assert::close(h[(0, 0)], 1.5 * silverman_scale(1, 2.0), TOL);
    }

    #[test]
    fn small_effective_count_still_uses_the_spread() {
        let est = BandwidthEstimator::default();
        let a = point(&[-10.0]);
        let b = point(&[10.0]);
        let h = est
            .estimate_from_parts(1, 1.2, vec![(1.0, &a, None), (1.0, &b, None)])
            .unwrap();
        assert::close(h[(0, 0)], 100.0 * silverman_scale(1, 1.2), TOL);
    }
}
