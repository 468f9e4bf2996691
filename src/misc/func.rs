use rand::Rng;
use std::ops::AddAssign;

/// Safely compute `log(sum(exp(xs))`
///
/// # Example
///
/// ```rust
/// # use okde::misc::logsumexp;
/// let xs = [0.0_f64; 4];
/// assert!((logsumexp(&xs) - 4.0_f64.ln()).abs() < 1E-12);
/// ```
pub fn logsumexp(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        panic!("Empty container");
    } else if xs.len() == 1 {
        xs[0]
    } else {
        let maxval = xs.iter().fold(f64::NEG_INFINITY, |acc, &x| acc.max(x));
        if maxval == f64::NEG_INFINITY {
            return maxval;
        }
        xs.iter().fold(0.0, |acc, x| acc + (x - maxval).exp()).ln() + maxval
    }
}

/// Cumulative sum of `xs`
///
/// # Example
///
/// ```rust
/// # use okde::misc::cumsum;
/// let xs: Vec<i32> = vec![1, 1, 2, 1];
/// assert_eq!(cumsum(&xs), vec![1, 2, 4, 5]);
/// ```
pub fn cumsum<T>(xs: &[T]) -> Vec<T>
where
    T: AddAssign + Copy + Default,
{
    xs.iter()
        .scan(T::default(), |acc, &x| {
            *acc += x;
            Some(*acc)
        })
        .collect()
}

/// Draw an index in proportion to the (not necessarily normalized)
/// `weights`.
///
/// # Panics
/// If `weights` is empty
pub fn pflip<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    if weights.is_empty() {
        panic!("Empty container");
    }
    let cws: Vec<f64> = cumsum(weights);
    let scale = cws[cws.len() - 1];
    let r = rng.gen::<f64>() * scale;
    cws.iter()
        .position(|&w| w > r)
        .unwrap_or(weights.len() - 1)
}
