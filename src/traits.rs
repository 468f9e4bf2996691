//! Trait definitions
use rand::Rng;

/// A distribution with a density
pub trait HasDensity<X> {
    /// Probability density at `x`
    fn f(&self, x: &X) -> f64 {
        self.ln_f(x).exp()
    }

    /// Log probability density at `x`
    fn ln_f(&self, x: &X) -> f64;
}

/// A distribution that can be drawn from
pub trait Sampleable<X> {
    /// Single draw
    fn draw<R: Rng>(&self, rng: &mut R) -> X;

    /// Multiple draws
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::{DMatrix, DVector};
    /// use okde::dist::GaussianComponent;
    /// use okde::traits::*;
    ///
    /// let cpnt = GaussianComponent::new(
    ///     1.0,
    ///     DVector::zeros(2),
    ///     DMatrix::identity(2, 2),
    /// ).unwrap();
    ///
    /// let mut rng = rand::thread_rng();
    /// let xs: Vec<DVector<f64>> = cpnt.sample(10, &mut rng);
    /// assert_eq!(xs.len(), 10);
    /// ```
    fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<X> {
        (0..n).map(|_| self.draw(rng)).collect()
    }

    /// An endless stream of draws
    fn sample_stream<'r, R: Rng>(
        &'r self,
        rng: &'r mut R,
    ) -> Box<dyn Iterator<Item = X> + 'r> {
        Box::new(std::iter::repeat_with(move || self.draw(rng)))
    }
}

/// Identifies the support of the distribution
pub trait Support<X> {
    /// Returns `true` if `x` is in the support of the distribution
    fn supports(&self, x: &X) -> bool;
}

/// Continuous probability distributions
pub trait ContinuousDistr<X>: HasDensity<X> + Support<X> {
    /// The value of the Probability Density Function (PDF) at `x`
    fn pdf(&self, x: &X) -> f64 {
        self.ln_pdf(x).exp()
    }

    /// The value of the log PDF at `x`. Negative infinity outside the
    /// support.
    fn ln_pdf(&self, x: &X) -> f64 {
        if self.supports(x) {
            self.ln_f(x)
        } else {
            f64::NEG_INFINITY
        }
    }
}

pub trait Mean<M> {
    fn mean(&self) -> Option<M>;
}

pub trait Variance<V> {
    fn variance(&self) -> Option<V>;
}
