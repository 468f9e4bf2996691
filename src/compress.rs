//! Mixture compression by greedy pairwise merging
use itertools::Itertools;
use log::{debug, trace};

use crate::config::SessionConfig;
use crate::consts::COST_TIE_TOL;
use crate::dist::{GaussianComponent, Mixture};
use crate::result::Result;

/// Outcome of one compression pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionReport {
    /// Number of components before compression
    pub before: usize,
    /// Number of components after compression
    pub after: usize,
    /// Number of pairwise merges performed
    pub merges: usize,
}

/// A candidate merge of components `i < j`
#[derive(Debug, Clone)]
struct Candidate {
    i: usize,
    j: usize,
    cost: f64,
    merged: GaussianComponent,
}

impl Candidate {
    /// `true` if `self` should be merged before `other`. Costs within
    /// `COST_TIE_TOL` are ties, broken by the larger combined weight and
    /// then the lowest index pair.
    fn precedes(&self, other: &Candidate) -> bool {
        if (self.cost - other.cost).abs() > COST_TIE_TOL {
            self.cost < other.cost
        } else if self.merged.weight() != other.merged.weight() {
            self.merged.weight() > other.merged.weight()
        } else {
            (self.i, self.j) < (other.i, other.j)
        }
    }
}

/// Reduces the number of components of a mixture by repeatedly merging the
/// pair whose moment-matched merge loses the least.
///
/// The loss of merging components i and j into M is the upper bound
///
/// ```text
/// (wᵢ H²(𝒩ᵢ, M) + wⱼ H²(𝒩ⱼ, M)) / (wᵢ + wⱼ)
/// ```
///
/// on the squared Hellinger distance between the pair and M. Pairs whose
/// means are more than `gate` apart in squared Mahalanobis distance under
/// Σᵢ + Σⱼ are never considered.
///
/// # Example
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use okde::compress::Compressor;
/// use okde::dist::{GaussianComponent, Mixture};
///
/// let cpnt = |x: f64| {
///     GaussianComponent::new(
///         1.0,
///         DVector::from_column_slice(&[x]),
///         DMatrix::identity(1, 1),
///     ).unwrap()
/// };
///
/// // Two near-duplicates and one far away component
/// let mut mm = Mixture::new(vec![cpnt(0.0), cpnt(0.01), cpnt(50.0)]).unwrap();
///
/// let report = Compressor::new(0.02, 9.0).compress(&mut mm).unwrap();
/// assert_eq!(report.merges, 1);
/// assert_eq!(mm.k(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Compressor {
    threshold: f64,
    gate: f64,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl Compressor {
    /// Merge while the cheapest merge costs less than `threshold`,
    /// considering only pairs within squared Mahalanobis distance `gate`.
    pub fn new(threshold: f64, gate: f64) -> Self {
        Compressor { threshold, gate }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.compression_threshold(), config.merge_gate())
    }

    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[inline]
    pub fn gate(&self) -> f64 {
        self.gate
    }

    /// The cost of merging `a` and `b` and the merged component, or `None`
    /// if the pair is outside the gate.
    pub fn merge_cost(
        &self,
        a: &GaussianComponent,
        b: &GaussianComponent,
    ) -> Result<Option<(f64, GaussianComponent)>> {
        if a.separation_sq(b)? > self.gate {
            return Ok(None);
        }

        let merged = GaussianComponent::merge(&[a, b])?;
        let cost = a.weight().mul_add(
            a.hellinger_sq(&merged)?,
            b.weight() * b.hellinger_sq(&merged)?,
        ) / merged.weight();

        Ok(Some((cost, merged)))
    }

    fn candidate(
        &self,
        components: &[GaussianComponent],
        i: usize,
        j: usize,
    ) -> Result<Option<Candidate>> {
        let cand = self
            .merge_cost(&components[i], &components[j])?
            .map(|(cost, merged)| Candidate { i, j, cost, merged });
        Ok(cand)
    }

    /// Compress `mixture` in place, returning what was done.
    ///
    /// The work happens on a copy: on error the mixture is left untouched.
    /// Merging preserves the total weight, and the component order is
    /// stable: a merged pair takes the place of its first member.
    pub fn compress(&self, mixture: &mut Mixture) -> Result<CompressionReport> {
        let before = mixture.k();
        let mut components = mixture.components().to_vec();

        let mut candidates: Vec<Candidate> = Vec::new();
        for (i, j) in (0..components.len()).tuple_combinations() {
            if let Some(cand) = self.candidate(&components, i, j)? {
                candidates.push(cand);
            }
        }

        let mut merges = 0;
        loop {
            let best = candidates.iter().enumerate().fold(
                None,
                |best: Option<(usize, &Candidate)>, (ix, cand)| match best {
                    Some((_, b)) if !cand.precedes(b) => best,
                    _ => Some((ix, cand)),
                },
            );

            let ix = match best {
                Some((ix, cand)) if cand.cost < self.threshold => ix,
                _ => break,
            };

            let Candidate { i, j, cost, merged } = candidates.swap_remove(ix);
            trace!(
                "merging components {} and {} (cost {:.3e}, weight {:.3e})",
                i,
                j,
                cost,
                merged.weight()
            );

            components[i] = merged;
            components.remove(j);
            merges += 1;

            candidates.retain(|cand| {
                cand.i != i && cand.j != i && cand.i != j && cand.j != j
            });
            candidates.iter_mut().for_each(|cand| {
                if cand.i > j {
                    cand.i -= 1;
                }
                if cand.j > j {
                    cand.j -= 1;
                }
            });

            for k in (0..components.len()).filter(|&k| k != i) {
                let (a, b) = if k < i { (k, i) } else { (i, k) };
                if let Some(cand) = self.candidate(&components, a, b)? {
                    candidates.push(cand);
                }
            }
        }

        let after = components.len();
        *mixture.components_mut() = components;

        debug!(
            "compressed mixture from {} to {} components ({} merges)",
            before, after, merges
        );

        Ok(CompressionReport {
            before,
            after,
            merges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::KdeError;
    use crate::test_basic_impls;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};

    const TOL: f64 = 1E-10;

    fn cpnt(weight: f64, mu: &[f64], var: f64) -> GaussianComponent {
        let dims = mu.len();
        GaussianComponent::new(
            weight,
            DVector::from_column_slice(mu),
            DMatrix::identity(dims, dims) * var,
        )
        .unwrap()
    }

    fn first_moment(mm: &Mixture) -> DVector<f64> {
        mm.components()
            .iter()
            .fold(DVector::zeros(mm.dims()), |acc, c| acc + c.mu() * c.weight())
    }

    fn second_moment(mm: &Mixture) -> DMatrix<f64> {
        let d = mm.dims();
        mm.components().iter().fold(DMatrix::zeros(d, d), |acc, c| {
            acc + (c.cov() + c.mu() * c.mu().transpose()) * c.weight()
        })
    }

    test_basic_impls!(Compressor::default());

    #[test]
    fn identical_components_cost_nothing() {
        let comp = Compressor::default();
        let a = cpnt(0.5, &[1.0, 1.0], 1.0);
        let (cost, merged) = comp.merge_cost(&a, &a).unwrap().unwrap();
        assert::close(cost, 0.0, TOL);
        assert::close(merged.weight(), 1.0, TOL);
    }

    #[test]
    fn far_apart_pairs_are_gated_out() {
        let comp = Compressor::new(1.0, 9.0);
        let a = cpnt(0.5, &[0.0], 1.0);
        // separation = 25 / 2 > 9
        let b = cpnt(0.5, &[5.0], 1.0);
        assert!(comp.merge_cost(&a, &b).unwrap().is_none());
        // separation = 16 / 2 < 9
        let c = cpnt(0.5, &[4.0], 1.0);
        assert!(comp.merge_cost(&a, &c).unwrap().is_some());
    }

    #[test]
    fn cost_grows_with_separation() {
        let comp = Compressor::new(1.0, 100.0);
        let a = cpnt(0.5, &[0.0], 1.0);
        let near = comp.merge_cost(&a, &cpnt(0.5, &[0.5], 1.0)).unwrap();
        let far = comp.merge_cost(&a, &cpnt(0.5, &[2.0], 1.0)).unwrap();
        assert!(near.unwrap().0 < far.unwrap().0);
    }

    #[test]
    fn compress_preserves_moments() {
        let mut mm = Mixture::new(vec![
            cpnt(0.2, &[0.0, 0.0], 1.0),
            cpnt(0.3, &[0.1, -0.1], 1.2),
            cpnt(0.5, &[0.05, 0.2], 0.9),
        ])
        .unwrap();

        let m1 = first_moment(&mm);
        let m2 = second_moment(&mm);

        let report = Compressor::new(0.5, 9.0).compress(&mut mm).unwrap();
        assert_eq!(report.after, 1);
        assert_eq!(report.merges, 2);

        assert::close(mm.total_weight(), 1.0, TOL);
        assert_relative_eq!(first_moment(&mm), m1, epsilon = TOL);
        assert_relative_eq!(second_moment(&mm), m2, epsilon = TOL);
    }

    #[test]
    fn zero_threshold_never_merges() {
        let mut mm = Mixture::new(vec![
            cpnt(0.5, &[0.0], 1.0),
            cpnt(0.5, &[0.0], 1.0),
        ])
        .unwrap();
        let before = mm.clone();
        let report = Compressor::new(0.0, 9.0).compress(&mut mm).unwrap();
        assert_eq!(
            report,
            CompressionReport {
                before: 2,
                after: 2,
                merges: 0
            }
        );
        assert_eq!(mm, before);
    }

    #[test]
    fn compress_never_grows_and_keeps_order() {
        let mut mm = Mixture::new(vec![
            cpnt(1.0, &[-20.0], 1.0),
            cpnt(1.0, &[0.0], 1.0),
            cpnt(1.0, &[0.01], 1.0),
            cpnt(1.0, &[20.0], 1.0),
        ])
        .unwrap();

        let report = Compressor::default().compress(&mut mm).unwrap();
        assert_eq!(report.before, 4);
        assert_eq!(report.after, 3);
        assert!(report.after <= report.before);

        let mus: Vec<f64> = mm.components().iter().map(|c| c.mu()[0]).collect();
        assert::close(mus[0], -20.0, TOL);
        assert::close(mus[1], 0.005, TOL);
        assert::close(mus[2], 20.0, TOL);
        assert::close(mm.weights(), vec![0.25, 0.5, 0.25], TOL);
    }

    #[test]
    fn ties_go_to_the_heavier_pair() {
        // Pairs (0, 1) and (2, 3) are equally cheap, but (2, 3) is heavier
        let mut mm = Mixture::new(vec![
            cpnt(0.1, &[-10.0], 1.0),
            cpnt(0.1, &[-10.0], 1.0),
            cpnt(0.4, &[10.0], 1.0),
            cpnt(0.4, &[10.0], 1.0),
        ])
        .unwrap();

        let comp = Compressor::new(1E-6, 9.0);
        let cands: Vec<Candidate> = (0..4)
            .tuple_combinations()
            .filter_map(|(i, j)| comp.candidate(mm.components(), i, j).unwrap())
            .collect();
        let best = cands
            .iter()
            .fold(None, |best: Option<&Candidate>, cand| match best {
                Some(b) if !cand.precedes(b) => best,
                _ => Some(cand),
            })
            .unwrap();
        assert_eq!((best.i, best.j), (2, 3));

        let report = comp.compress(&mut mm).unwrap();
        assert_eq!(report.after, 2);
        assert::close(mm.weights(), vec![0.2, 0.8], TOL);
    }

    #[test]
    fn equal_ties_go_to_the_lowest_pair() {
        let a = cpnt(0.25, &[0.0], 1.0);
        let comp = Compressor::new(1.0, 9.0);
        let components = vec![a.clone(), a.clone(), a.clone(), a];
        let c01 = comp.candidate(&components, 0, 1).unwrap().unwrap();
        let c23 = comp.candidate(&components, 2, 3).unwrap().unwrap();
        assert!(c01.precedes(&c23));
        assert!(!c23.precedes(&c01));
    }

    #[test]
    fn compress_empty_and_single_are_noops() {
        let comp = Compressor::default();
        let mut empty = Mixture::sample_model(2).unwrap();
        let report = comp.compress(&mut empty).unwrap();
        assert_eq!(report.merges, 0);
        assert!(empty.is_empty());

        let mut single = Mixture::new(vec![cpnt(1.0, &[0.0], 1.0)]).unwrap();
        let report = comp.compress(&mut single).unwrap();
        assert_eq!(report.after, 1);
    }

    #[test]
    fn sample_covariances_merge_too() {
        let mut mm = Mixture::new(vec![
            cpnt(0.5, &[-0.05], 1.0),
            cpnt(0.5, &[0.05], 1.0),
        ])
        .unwrap();
        Compressor::default().compress(&mut mm).unwrap();
        let merged = &mm.components()[0];
        // both sample covariances equal the covariances here
        assert::close(merged.sample_cov()[(0, 0)], 1.0 + 0.05 * 0.05, TOL);
        assert_relative_eq!(merged.sample_cov(), merged.cov(), epsilon = TOL);
    }

    #[test]
    fn overflowing_pair_leaves_mixture_untouched() {
        // each covariance is finite but their sum is not
        let mut mm = Mixture::new(vec![
            cpnt(1.0, &[0.0], 1E308),
            cpnt(1.0, &[1.0], 1E308),
        ])
        .unwrap();
        let before = mm.clone();

        let res = Compressor::new(0.5, 9.0).compress(&mut mm);
        assert!(matches!(res, Err(KdeError::NumericInstability { .. })));
        assert_eq!(mm, before);
    }

    #[test]
    fn failure_after_a_merge_leaves_mixture_untouched() {
        // The first two merge cheaply. The third is gated out from both, but
        // its covariance sum with the (broader) merged component overflows
        // once the pairs are refreshed.
        let d = 3.2E153;
        let mut mm = Mixture::new(vec![
            cpnt(1.0, &[-d], 0.8E308),
            cpnt(1.0, &[d], 0.8E308),
            cpnt(1.0, &[1E155], 0.95E308),
        ])
        .unwrap();
        let before = mm.clone();

        let comp = Compressor::new(0.5, 9.0);
        let cost = comp
            .merge_cost(&mm.components()[0], &mm.components()[1])
            .unwrap()
            .map(|(cost, _)| cost);
        assert!(cost.map_or(false, |c| c < 0.5));
        assert!(comp
            .merge_cost(&mm.components()[0], &mm.components()[2])
            .unwrap()
            .is_none());

        let res = comp.compress(&mut mm);
        assert!(matches!(res, Err(KdeError::NumericInstability { .. })));
        assert_eq!(mm, before);
    }
}
