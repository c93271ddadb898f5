//! Stop-loss evaluation: raw vs. adjusted comparison and a linear scan for the
//! best stop level under a selectable metric.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use signallab_core::config::ConfigError;
use signallab_core::domain::SeriesError;
use signallab_core::horizon::{horizon_delta, HorizonAnalyzer, HorizonCache};
use signallab_core::metrics::{trade_returns, PerformanceSnapshot};
use signallab_core::quality::{score_quality, QualityScore, QualityWeights};
use signallab_core::stop_loss::{StopLossAdjustment, StopLossConfig, StopLossSimulator};

use crate::orchestrator::AnalysisError;

/// Resolution that scanned stop levels are rounded to.
const LEVEL_RESOLUTION: f64 = 1e-9;

/// Upper bound on levels in one scan; each level is a full analysis.
pub const MAX_STOP_LEVELS: usize = 1_000;

// ─── Metric selector ─────────────────────────────────────────────────

/// Which adjusted metric the stop-loss scan maximizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMetric {
    #[default]
    Sharpe,
    WinRate,
    AvgReturn,
    ProfitFactor,
    Expectancy,
    QualityScore,
}

impl OptimizationMetric {
    pub const ALL: [Self; 6] = [
        Self::Sharpe,
        Self::WinRate,
        Self::AvgReturn,
        Self::ProfitFactor,
        Self::Expectancy,
        Self::QualityScore,
    ];

    pub fn extract(&self, metrics: &PerformanceSnapshot, quality: &QualityScore) -> f64 {
        match self {
            Self::Sharpe => metrics.sharpe,
            Self::WinRate => metrics.win_rate,
            Self::AvgReturn => metrics.avg_return,
            Self::ProfitFactor => metrics.profit_factor,
            Self::Expectancy => metrics.expectancy,
            Self::QualityScore => quality.score,
        }
    }

    /// Value of this metric after the stop is applied.
    pub fn extract_adjusted(&self, adjustment: &StopLossAdjustment) -> f64 {
        self.extract(&adjustment.adjusted_metrics, &adjustment.adjusted_quality)
    }

    /// Strictly better. Every selectable metric is higher-is-better.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe",
            Self::WinRate => "win_rate",
            Self::AvgReturn => "avg_return",
            Self::ProfitFactor => "profit_factor",
            Self::Expectancy => "expectancy",
            Self::QualityScore => "quality_score",
        }
    }
}

impl fmt::Display for OptimizationMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown optimization metric '{0}' (expected one of sharpe, win_rate, avg_return, profit_factor, expectancy, quality_score)")]
pub struct UnknownMetric(pub String);

impl FromStr for OptimizationMetric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

// ─── Raw vs. adjusted ────────────────────────────────────────────────

/// Compare raw and stop-adjusted performance for one stop level.
///
/// Both sides are summarized per position (see [`trade_returns`]) and run
/// through the same horizon analyzer and quality weights, so the deltas in
/// `impact` and `horizon_impact` isolate the effect of the stop.
pub fn calculate_stop_loss_adjusted_metrics(
    positions: &[f64],
    returns: &[f64],
    simulator: &StopLossSimulator,
    horizon: &HorizonAnalyzer,
    weights: &QualityWeights,
    cache: Option<&HorizonCache>,
) -> Result<StopLossAdjustment, SeriesError> {
    let outcome = simulator.apply(returns, positions)?;

    let raw_metrics = PerformanceSnapshot::from_returns(&trade_returns(positions, returns));
    let adjusted_metrics =
        PerformanceSnapshot::from_returns(&trade_returns(positions, &outcome.adjusted_returns));
    let raw_quality = score_quality(&raw_metrics, weights);
    let adjusted_quality = score_quality(&adjusted_metrics, weights);

    let raw_horizon = horizon.analyze(positions, returns, cache)?;
    let adjusted_horizon = horizon.analyze(positions, &outcome.adjusted_returns, cache)?;
    let horizon_impact = horizon_delta(&raw_horizon.metrics, &adjusted_horizon.metrics);

    let trigger_count = outcome.trigger_count();
    let trigger_rate = outcome.trigger_rate();
    tracing::debug!(
        stop = simulator.stop_loss_fraction(),
        trigger_count,
        positions_opened = outcome.positions_opened,
        "stop-loss applied"
    );

    Ok(StopLossAdjustment {
        stop_loss_fraction: simulator.stop_loss_fraction(),
        impact: adjusted_metrics.delta(&raw_metrics),
        quality_impact: adjusted_quality.score - raw_quality.score,
        raw_metrics,
        adjusted_metrics,
        raw_quality,
        adjusted_quality,
        raw_best_horizon: raw_horizon.best_horizon,
        adjusted_best_horizon: adjusted_horizon.best_horizon,
        raw_horizon_metrics: raw_horizon.metrics,
        adjusted_horizon_metrics: adjusted_horizon.metrics,
        horizon_impact,
        trigger_count,
        positions_opened: outcome.positions_opened,
        trigger_rate,
        trigger_indices: outcome.trigger_indices,
    })
}

// ─── Stop-level scan ─────────────────────────────────────────────────

/// Inclusive range of stop fractions scanned at a fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopLossRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl StopLossRange {
    pub fn new(min: f64, max: f64, step: f64) -> Result<Self, ConfigError> {
        let range = Self { min, max, step };
        range.validate()?;
        Ok(range)
    }

    /// `0 < min <= max < 1`, `step` at least the level resolution, and no
    /// more than [`MAX_STOP_LEVELS`] levels.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = self.min.is_finite()
            && self.max.is_finite()
            && self.step.is_finite()
            && self.min > 0.0
            && self.min <= self.max
            && self.max < 1.0
            && self.step >= LEVEL_RESOLUTION;
        if !ok {
            return Err(ConfigError::InvalidStopLossRange {
                min: self.min,
                max: self.max,
                step: self.step,
            });
        }
        let levels = ((self.max - self.min) / self.step + LEVEL_RESOLUTION).floor() + 1.0;
        if levels > MAX_STOP_LEVELS as f64 {
            return Err(ConfigError::TooManyStopLevels {
                levels,
                maximum: MAX_STOP_LEVELS,
            });
        }
        Ok(())
    }

    /// `min + k*step`, rounded to the level resolution, up to `max` inclusive.
    pub fn levels(&self) -> Vec<f64> {
        let max = round_level(self.max);
        let mut out = Vec::new();
        for k in 0u64.. {
            let level = round_level(self.min + k as f64 * self.step);
            if level > max {
                break;
            }
            out.push(level);
        }
        out
    }
}

fn round_level(value: f64) -> f64 {
    (value / LEVEL_RESOLUTION).round() * LEVEL_RESOLUTION
}

/// One scanned stop level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopLevelScore {
    pub stop_loss_fraction: f64,
    pub value: f64,
    pub trigger_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossOptimization {
    pub metric: OptimizationMetric,
    pub best_stop: f64,
    pub best_value: f64,
    /// Full comparison at the winning level.
    pub best: StopLossAdjustment,
    /// Every tested level in ascending order.
    pub tested: Vec<StopLevelScore>,
}

/// Scan `range` and pick the level with the best adjusted `metric`.
/// Ties go to the tightest (smallest) stop.
pub fn find_optimal_stop_loss(
    positions: &[f64],
    returns: &[f64],
    range: &StopLossRange,
    metric: OptimizationMetric,
    horizon: &HorizonAnalyzer,
    weights: &QualityWeights,
    cache: Option<&HorizonCache>,
) -> Result<StopLossOptimization, AnalysisError> {
    range.validate()?;

    let mut tested = Vec::new();
    let mut best: Option<(f64, StopLossAdjustment)> = None;

    for level in range.levels() {
        let simulator = StopLossSimulator::new(StopLossConfig::new(level)?)?;
        let adjustment =
            calculate_stop_loss_adjusted_metrics(positions, returns, &simulator, horizon, weights, cache)?;
        let value = metric.extract_adjusted(&adjustment);
        tested.push(StopLevelScore {
            stop_loss_fraction: level,
            value,
            trigger_count: adjustment.trigger_count,
        });
        match &best {
            Some((best_value, _)) if !metric.is_better(value, *best_value) => {}
            _ => best = Some((value, adjustment)),
        }
    }

    // A validated range always yields `min` as its first level.
    let Some((best_value, best)) = best else {
        return Err(ConfigError::InvalidStopLossRange {
            min: range.min,
            max: range.max,
            step: range.step,
        }
        .into());
    };

    tracing::info!(
        metric = %metric,
        best_stop = best.stop_loss_fraction,
        best_value,
        levels = tested.len(),
        "stop-loss scan complete"
    );

    Ok(StopLossOptimization {
        metric,
        best_stop: best.stop_loss_fraction,
        best_value,
        best,
        tested,
    })
}
