//! Mathematical constants and numerical tolerances

/// 0.5 ln(2π)
pub const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;

/// Tolerance on the sum of mixture weights
pub const WEIGHT_SUM_TOL: f64 = 1E-9;
/// Relative tolerance for the symmetry check on covariance matrices
pub const SYMMETRY_TOL: f64 = 1E-9;
/// Relative tolerance on negative eigenvalues of a PSD matrix
pub const PSD_TOL: f64 = 1E-10;
/// Merge costs closer than this are considered tied
pub const COST_TIE_TOL: f64 = 1E-12;
/// Below this many weighted parts the spread, and so the bandwidth, is undefined
pub const MIN_BANDWIDTH_PARTS: usize = 2;
