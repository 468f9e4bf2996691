//! Estimation session parameters
use std::fmt;
use std::num::NonZeroUsize;

/// Parameters fixed for the lifetime of an estimation session.
///
/// # Example
///
/// ```
/// use okde::config::SessionConfig;
///
/// let mut config = SessionConfig::new(0.99, 0.05).unwrap();
/// config.set_max_components(50).unwrap();
///
/// assert_eq!(config.forgetting_factor(), 0.99);
/// assert_eq!(config.max_components(), 50);
///
/// // invalid values are rejected
/// assert!(config.set_max_components(0).is_err());
/// assert!(SessionConfig::new(1.2, 0.05).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Exponential decay applied to existing weights on every update, in (0, 1]
    forgetting_factor: f64,
    /// Merge while the cheapest merge costs less than this
    compression_threshold: f64,
    /// Compress when the mixture holds more components than this
    max_components: usize,
    /// Also compress after every `n` updates
    compress_every: Option<NonZeroUsize>,
    /// Squared Mahalanobis distance beyond which two components never merge
    merge_gate: f64,
    /// Components with a smaller normalized weight are removed
    prune_threshold: f64,
    /// Smallest eigenvalue allowed in the bandwidth matrix
    bandwidth_floor: f64,
    /// Isotropic bandwidth variance used while the model holds a single
    /// observation
    default_bandwidth: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The forgetting factor is not in (0, 1]
    ForgettingFactorOutOfRange { f: f64 },
    /// The compression threshold is negative or NaN
    CompressionThresholdTooLow { threshold: f64 },
    /// The size trigger must allow at least one component
    MaxComponentsIsZero,
    /// The merge gate is not positive
    MergeGateTooLow { gate: f64 },
    /// The prune threshold is not in [0, 1)
    PruneThresholdOutOfRange { threshold: f64 },
    /// A bandwidth parameter is not positive and finite
    BandwidthNotPositive { bandwidth: f64 },
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            forgetting_factor: 1.0,
            compression_threshold: 0.02,
            max_components: 20,
            compress_every: None,
            merge_gate: 9.0,
            prune_threshold: 1E-12,
            bandwidth_floor: 1E-9,
            default_bandwidth: 1E-2,
        }
    }
}

fn check_positive_bandwidth(bandwidth: f64) -> Result<(), ConfigError> {
    if bandwidth > 0.0 && bandwidth.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::BandwidthNotPositive { bandwidth })
    }
}

impl SessionConfig {
    /// Create a configuration with the given forgetting factor and
    /// compression threshold. Everything else takes its default.
    pub fn new(
        forgetting_factor: f64,
        compression_threshold: f64,
    ) -> Result<Self, ConfigError> {
        let mut config = SessionConfig::default();
        config.set_forgetting_factor(forgetting_factor)?;
        config.set_compression_threshold(compression_threshold)?;
        Ok(config)
    }

    /// Creates a new configuration without checking whether the parameters
    /// are valid.
    #[inline]
    pub fn new_unchecked(
        forgetting_factor: f64,
        compression_threshold: f64,
    ) -> Self {
        SessionConfig {
            forgetting_factor,
            compression_threshold,
            ..SessionConfig::default()
        }
    }

    #[inline]
    pub fn forgetting_factor(&self) -> f64 {
        self.forgetting_factor
    }

    /// Set the forgetting factor. Must be in (0, 1].
    pub fn set_forgetting_factor(&mut self, f: f64) -> Result<(), ConfigError> {
        if f > 0.0 && f <= 1.0 {
            self.forgetting_factor = f;
            Ok(())
        } else {
            Err(ConfigError::ForgettingFactorOutOfRange { f })
        }
    }

    /// Set the forgetting factor without input validation
    #[inline]
    pub fn set_forgetting_factor_unchecked(&mut self, f: f64) {
        self.forgetting_factor = f;
    }

    #[inline]
    pub fn compression_threshold(&self) -> f64 {
        self.compression_threshold
    }

    /// Set the compression threshold. Must be non-negative and finite.
    /// A threshold of zero disables merging.
    pub fn set_compression_threshold(
        &mut self,
        threshold: f64,
    ) -> Result<(), ConfigError> {
        if threshold >= 0.0 && threshold.is_finite() {
            self.compression_threshold = threshold;
            Ok(())
        } else {
            Err(ConfigError::CompressionThresholdTooLow { threshold })
        }
    }

    /// Set the compression threshold without input validation
    #[inline]
    pub fn set_compression_threshold_unchecked(&mut self, threshold: f64) {
        self.compression_threshold = threshold;
    }

    #[inline]
    pub fn max_components(&self) -> usize {
        self.max_components
    }

    pub fn set_max_components(&mut self, n: usize) -> Result<(), ConfigError> {
        if n == 0 {
            Err(ConfigError::MaxComponentsIsZero)
        } else {
            self.max_components = n;
            Ok(())
        }
    }

    #[inline]
    pub fn compress_every(&self) -> Option<NonZeroUsize> {
        self.compress_every
    }

    /// Compress after every `n` updates, regardless of size. `None` leaves
    /// only the size trigger.
    #[inline]
    pub fn set_compress_every(&mut self, n: Option<NonZeroUsize>) {
        self.compress_every = n;
    }

    #[inline]
    pub fn merge_gate(&self) -> f64 {
        self.merge_gate
    }

    pub fn set_merge_gate(&mut self, gate: f64) -> Result<(), ConfigError> {
        if gate > 0.0 && !gate.is_nan() {
            self.merge_gate = gate;
            Ok(())
        } else {
            Err(ConfigError::MergeGateTooLow { gate })
        }
    }

    #[inline]
    pub fn prune_threshold(&self) -> f64 {
        self.prune_threshold
    }

    pub fn set_prune_threshold(
        &mut self,
        threshold: f64,
    ) -> Result<(), ConfigError> {
        if (0.0..1.0).contains(&threshold) {
            self.prune_threshold = threshold;
            Ok(())
        } else {
            Err(ConfigError::PruneThresholdOutOfRange { threshold })
        }
    }

    #[inline]
    pub fn bandwidth_floor(&self) -> f64 {
        self.bandwidth_floor
    }

    pub fn set_bandwidth_floor(&mut self, floor: f64) -> Result<(), ConfigError> {
        check_positive_bandwidth(floor)?;
        self.bandwidth_floor = floor;
        Ok(())
    }

    #[inline]
    pub fn default_bandwidth(&self) -> f64 {
        self.default_bandwidth
    }

    pub fn set_default_bandwidth(
        &mut self,
        bandwidth: f64,
    ) -> Result<(), ConfigError> {
        check_positive_bandwidth(bandwidth)?;
        self.default_bandwidth = bandwidth;
        Ok(())
    }

    /// Re-check every parameter. Catches values slipped in through
    /// `new_unchecked`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut check = SessionConfig::default();
        check.set_forgetting_factor(self.forgetting_factor)?;
        check.set_compression_threshold(self.compression_threshold)?;
        check.set_max_components(self.max_components)?;
        check.set_merge_gate(self.merge_gate)?;
        check.set_prune_threshold(self.prune_threshold)?;
        check.set_bandwidth_floor(self.bandwidth_floor)?;
        check.set_default_bandwidth(self.default_bandwidth)
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForgettingFactorOutOfRange { f: ff } => {
                write!(f, "forgetting factor ({}) must be in (0, 1]", ff)
            }
            Self::CompressionThresholdTooLow { threshold } => write!(
                f,
                "compression threshold ({}) must be non-negative",
                threshold
            ),
            Self::MaxComponentsIsZero => {
                write!(f, "max components must be at least one")
            }
            Self::MergeGateTooLow { gate } => {
                write!(f, "merge gate ({}) must be positive", gate)
            }
            Self::PruneThresholdOutOfRange { threshold } => {
                write!(f, "prune threshold ({}) must be in [0, 1)", threshold)
            }
            Self::BandwidthNotPositive { bandwidth } => write!(
                f,
                "bandwidth ({}) must be positive and finite",
                bandwidth
            ),
        }
    }
}
