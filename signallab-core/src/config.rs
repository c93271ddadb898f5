//! Configuration validation errors shared by every component.
//!
//! Each component owns an immutable config struct with documented defaults and
//! a `validate()` method. Validation happens once, before any computation, and
//! reports the specific parameter that is wrong.

use thiserror::Error;

/// A configuration that can never produce a meaningful analysis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("stop-loss fraction must be finite and in (0, 1), got {0}")]
    InvalidStopLoss(f64),
    #[error("stop-loss scan range invalid: min={min}, max={max}, step={step}")]
    InvalidStopLossRange { min: f64, max: f64, step: f64 },
    #[error("stop-loss scan would test {levels} levels, at most {maximum} allowed")]
    TooManyStopLevels { levels: f64, maximum: usize },
    #[error("horizon set is empty")]
    EmptyHorizonSet,
    #[error("horizon must be >= 1")]
    ZeroHorizon,
    #[error("min_sample_size must be >= 1")]
    ZeroMinSampleSize,
    #[error("sample_size_factor must be finite and > 0, got {0}")]
    InvalidSampleSizeFactor(f64),
    #[error("weight '{name}' must be finite and >= 0, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },
    #[error("threshold '{name}' must be finite, got {value}")]
    NonFiniteThreshold { name: &'static str, value: f64 },
    #[error("volatility band invalid: min_atr={min} must be >= 0 and <= max_atr={max}")]
    InvalidAtrBand { min: f64, max: f64 },
    #[error("volume floor must be finite and >= 0, got {0}")]
    InvalidVolumeFloor(f64),
    #[error("filter feature name must not be empty")]
    EmptyFeatureName,
    #[error("position size must be finite and in (0, {max}], got {value}")]
    InvalidPositionSize { value: f64, max: f64 },
    #[error(
        "exit cut points must satisfy 0 <= sell < strong_sell < exit_immediately <= 100, \
         got {sell}/{strong_sell}/{exit_immediately}"
    )]
    CutPointsNotOrdered {
        sell: f64,
        strong_sell: f64,
        exit_immediately: f64,
    },
    #[error("percentile bounds must satisfy 0 <= floor < ceiling <= 100, got {floor}/{ceiling}")]
    InvalidPercentileBounds { floor: f64, ceiling: f64 },
    #[error("bootstrap needs at least {minimum} iterations, got {iterations}")]
    TooFewBootstrapIterations { iterations: usize, minimum: usize },
    #[error("sample tiers must satisfy low <= medium <= high, got {low}/{medium}/{high}")]
    TierThresholdsNotOrdered { low: usize, medium: usize, high: usize },
    #[error("confidence parameter '{name}' must be in [0, 1], got {value}")]
    InvalidConfidenceParameter { name: &'static str, value: f64 },
    #[error("convergence tolerance must be finite and >= 0, got {0}")]
    InvalidConvergenceTolerance(f64),
    #[error("worker cap must be >= 1")]
    ZeroWorkerCap,
    #[error("cache capacity and shard count must be >= 1")]
    InvalidCacheSize,
}

/// Check that a weight is finite and non-negative.
pub(crate) fn check_weight(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidWeight { name, value })
    }
}

/// Check that a threshold is finite.
pub(crate) fn check_finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFiniteThreshold { name, value })
    }
}

/// Check that a probability-like parameter lies in [0, 1].
pub(crate) fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidConfidenceParameter { name, value })
    }
}
