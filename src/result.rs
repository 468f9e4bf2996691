//! Errors raised by the estimator
use std::fmt;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, KdeError>;

/// Ways in which a covariance matrix can fail validation
#[derive(Debug, Clone, PartialEq)]
pub enum CovarianceError {
    /// The matrix is not square
    NotSquare {
        /// number of rows
        nrows: usize,
        /// number of columns
        ncols: usize,
    },
    /// The matrix contains an infinite or NaN entry
    NotFinite,
    /// Entry (row, col) differs from entry (col, row)
    NotSymmetric { row: usize, col: usize },
    /// The matrix has an eigenvalue below zero
    NegativeEigenvalue { eigenvalue: f64 },
}

/// Errors from session construction, updates, compression and evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum KdeError {
    /// An update was called with no samples
    EmptyInput,
    /// A point or matrix does not have the dimension of the mixture
    DimensionMismatch {
        /// Dimension of the mixture
        expected: usize,
        /// Dimension of the offending input
        found: usize,
    },
    /// A supplied covariance is not symmetric positive semi-definite
    InvalidCovariance(CovarianceError),
    /// The density of a mixture with no components is undefined
    EmptyDistribution,
    /// A decomposition failed or produced non-finite values
    NumericInstability {
        /// The computation that failed
        operation: &'static str,
    },
    /// A sample weight is not finite or is not greater than zero
    InvalidWeight { weight: f64 },
    /// A sample point has an infinite or NaN coordinate
    NonFinitePoint,
    /// The mixture is an evaluation-only shape and cannot be updated
    EvaluationOnly,
    /// A dimension index is out of range or repeated
    InvalidDimensionIndex { index: usize, dims: usize },
    /// A session must have at least one dimension
    ZeroDimensions,
    /// The session configuration is invalid
    Config(ConfigError),
}

impl KdeError {
    pub(crate) fn unstable(operation: &'static str) -> Self {
        KdeError::NumericInstability { operation }
    }
}

impl From<ConfigError> for KdeError {
    fn from(err: ConfigError) -> Self {
        KdeError::Config(err)
    }
}

impl From<CovarianceError> for KdeError {
    fn from(err: CovarianceError) -> Self {
        KdeError::InvalidCovariance(err)
    }
}

impl std::error::Error for CovarianceError {}

impl fmt::Display for CovarianceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSquare { nrows, ncols } => {
                write!(f, "covariance is not square ({}x{})", nrows, ncols)
            }
            Self::NotFinite => write!(f, "covariance has non-finite entries"),
            Self::NotSymmetric { row, col } => write!(
                f,
                "covariance is not symmetric at ({}, {})",
                row, col
            ),
            Self::NegativeEigenvalue { eigenvalue } => write!(
                f,
                "covariance has a negative eigenvalue ({})",
                eigenvalue
            ),
        }
    }
}

impl std::error::Error for KdeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidCovariance(err) => Some(err),
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for KdeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "no samples were supplied"),
            Self::DimensionMismatch { expected, found } => write!(
                f,
                "expected dimension {} but found {}",
                expected, found
            ),
            Self::InvalidCovariance(err) => {
                write!(f, "invalid covariance: {}", err)
            }
            Self::EmptyDistribution => {
                write!(f, "the distribution has no components")
            }
            Self::NumericInstability { operation } => {
                write!(f, "numerically unstable: {}", operation)
            }
            Self::InvalidWeight { weight } => {
                write!(f, "weight ({}) must be finite and positive", weight)
            }
            Self::NonFinitePoint => {
                write!(f, "sample point has non-finite coordinates")
            }
            Self::EvaluationOnly => {
                write!(f, "evaluation-only mixtures cannot be updated")
            }
            Self::InvalidDimensionIndex { index, dims } => write!(
                f,
                "dimension index {} is repeated or out of range for {} dims",
                index, dims
            ),
            Self::ZeroDimensions => {
                write!(f, "the number of dimensions must be at least one")
            }
            Self::Config(err) => write!(f, "invalid configuration: {}", err),
        }
    }
}
