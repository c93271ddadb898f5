//! Stop-loss simulation — path-dependent truncation of position returns.
//!
//! One forward pass over the series. For every open position the cumulative
//! position-space return since entry is tracked from the period after entry.
//! The first period where it reaches `-stop_loss_fraction` is rewritten to a
//! loss of exactly `stop_loss_fraction` and the position is treated as closed
//! until the (unchanged) position series opens a new one.
//!
//! For longs the stop is hit when the summed returns fall to `-fraction`;
//! for shorts when they rise to `+fraction`.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::{ensure_aligned, SeriesError};
use crate::horizon::{HorizonDeltaMap, HorizonMetricsMap};
use crate::metrics::PerformanceSnapshot;
use crate::quality::QualityScore;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopLossConfig {
    /// Maximum adverse excursion as a fraction (e.g., 0.05 for 5%).
    pub stop_loss_fraction: f64,
}

impl StopLossConfig {
    pub fn new(stop_loss_fraction: f64) -> Result<Self, ConfigError> {
        let config = Self { stop_loss_fraction };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_fraction(self.stop_loss_fraction)
    }
}

pub(crate) fn validate_fraction(fraction: f64) -> Result<(), ConfigError> {
    if fraction.is_finite() && fraction > 0.0 && fraction < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidStopLoss(fraction))
    }
}

/// Result of one simulation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossOutcome {
    pub adjusted_returns: Vec<f64>,
    pub trigger_indices: Vec<usize>,
    pub positions_opened: usize,
}

impl StopLossOutcome {
    pub fn trigger_count(&self) -> usize {
        self.trigger_indices.len()
    }

    /// `trigger_count / positions_opened`, 0 when nothing was opened.
    pub fn trigger_rate(&self) -> f64 {
        if self.positions_opened == 0 {
            0.0
        } else {
            self.trigger_count() as f64 / self.positions_opened as f64
        }
    }
}

/// Apply a stop at `stop_loss_fraction` to `returns` under `positions`.
pub fn apply_stop_loss(
    returns: &[f64],
    positions: &[f64],
    stop_loss_fraction: f64,
) -> Result<StopLossOutcome, SeriesError> {
    ensure_aligned("returns", returns.len(), "positions", positions.len())?;

    let mut adjusted = returns.to_vec();
    let mut trigger_indices = Vec::new();
    let mut positions_opened = 0;
    let mut cumulative = 0.0;
    let mut stopped = false;

    for (i, (&exposure, &ret)) in positions.iter().zip(returns).enumerate() {
        if exposure == 0.0 {
            stopped = false;
            continue;
        }
        let opened = i == 0 || positions[i - 1] != exposure;
        if opened {
            positions_opened += 1;
            cumulative = 0.0;
            stopped = false;
            continue;
        }
        if stopped {
            adjusted[i] = 0.0;
            continue;
        }
        let sign = exposure.signum();
        cumulative += sign * ret;
        if cumulative <= -stop_loss_fraction {
            adjusted[i] = -sign * stop_loss_fraction;
            trigger_indices.push(i);
            stopped = true;
            cumulative = 0.0;
        }
    }

    Ok(StopLossOutcome {
        adjusted_returns: adjusted,
        trigger_indices,
        positions_opened,
    })
}

/// Validated simulator bound to one stop level.
#[derive(Debug, Clone, Copy)]
pub struct StopLossSimulator {
    config: StopLossConfig,
}

impl StopLossSimulator {
    pub fn new(config: StopLossConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn stop_loss_fraction(&self) -> f64 {
        self.config.stop_loss_fraction
    }

    pub fn apply(&self, returns: &[f64], positions: &[f64]) -> Result<StopLossOutcome, SeriesError> {
        apply_stop_loss(returns, positions, self.config.stop_loss_fraction)
    }
}

/// Raw vs. stop-adjusted comparison for one stop level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossAdjustment {
    pub stop_loss_fraction: f64,
    pub raw_metrics: PerformanceSnapshot,
    pub adjusted_metrics: PerformanceSnapshot,
    /// `adjusted_metrics - raw_metrics`, field by field.
    pub impact: PerformanceSnapshot,
    pub raw_quality: QualityScore,
    pub adjusted_quality: QualityScore,
    pub quality_impact: f64,
    pub raw_horizon_metrics: HorizonMetricsMap,
    pub adjusted_horizon_metrics: HorizonMetricsMap,
    /// Per-horizon `adjusted - raw`.
    pub horizon_impact: HorizonDeltaMap,
    pub raw_best_horizon: Option<usize>,
    pub adjusted_best_horizon: Option<usize>,
    pub trigger_indices: Vec<usize>,
    pub trigger_count: usize,
    pub positions_opened: usize,
    pub trigger_rate: f64,
}
