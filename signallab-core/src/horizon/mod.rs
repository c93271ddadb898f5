//! Multi-horizon return analysis and best-horizon selection.
//!
//! For each horizon `h`, every index `i` holding a position contributes the
//! signed sum of the next `h` period returns starting at `i`, provided the
//! window fits inside the series. The position series is already shifted one
//! step relative to the signals, so the window never overlaps the bar on which
//! the signal was generated.

pub mod cache;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{check_weight, ConfigError};
use crate::domain::{ensure_aligned, SeriesError};
use crate::fallback::{finite_or, ZERO_FALLBACK};
use crate::stats;

pub use cache::{CacheStats, HorizonCache};

// ─── Configuration ───────────────────────────────────────────────────

/// Weights for the best-horizon score.
///
/// `score(h) = sharpe_weight*sharpe + win_rate_weight*win_rate
///           + sample_size_weight*min(1, sample_size/sample_size_factor)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonWeights {
    pub sharpe_weight: f64,
    pub win_rate_weight: f64,
    pub sample_size_weight: f64,
    pub sample_size_factor: f64,
}

impl Default for HorizonWeights {
    fn default() -> Self {
        Self {
            sharpe_weight: 0.6,
            win_rate_weight: 0.3,
            sample_size_weight: 0.1,
            sample_size_factor: 100.0,
        }
    }
}

impl HorizonWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_weight("sharpe_weight", self.sharpe_weight)?;
        check_weight("win_rate_weight", self.win_rate_weight)?;
        check_weight("sample_size_weight", self.sample_size_weight)?;
        if !self.sample_size_factor.is_finite() || self.sample_size_factor <= 0.0 {
            return Err(ConfigError::InvalidSampleSizeFactor(self.sample_size_factor));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    pub horizons: Vec<usize>,
    /// Horizons with fewer samples report null metrics and are never selected.
    pub min_sample_size: usize,
    pub weights: HorizonWeights,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            horizons: vec![1, 3, 5, 10],
            min_sample_size: 20,
            weights: HorizonWeights::default(),
        }
    }
}

impl HorizonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizons.is_empty() {
            return Err(ConfigError::EmptyHorizonSet);
        }
        if self.horizons.contains(&0) {
            return Err(ConfigError::ZeroHorizon);
        }
        if self.min_sample_size == 0 {
            return Err(ConfigError::ZeroMinSampleSize);
        }
        self.weights.validate()
    }

    /// Sorted, deduplicated horizon set.
    pub fn normalized_horizons(&self) -> Vec<usize> {
        normalize_horizons(&self.horizons)
    }
}

pub(crate) fn normalize_horizons(horizons: &[usize]) -> Vec<usize> {
    let mut out = horizons.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

// ─── Metrics ─────────────────────────────────────────────────────────

/// Aggregate performance of one holding horizon.
///
/// The aggregate fields are `None` when `sample_size` is below the configured
/// minimum: an undersized sample is reported, never scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonMetrics {
    pub horizon: usize,
    pub sample_size: usize,
    pub avg_return: Option<f64>,
    pub win_rate: Option<f64>,
    pub sharpe: Option<f64>,
}

impl HorizonMetrics {
    pub fn is_eligible(&self) -> bool {
        self.avg_return.is_some() && self.win_rate.is_some() && self.sharpe.is_some()
    }

    /// Weighted selection score. `None` for ineligible horizons.
    pub fn score(&self, weights: &HorizonWeights) -> Option<f64> {
        let (sharpe, win_rate) = (self.sharpe?, self.win_rate?);
        let coverage = (self.sample_size as f64 / weights.sample_size_factor).min(1.0);
        let raw = weights.sharpe_weight * sharpe
            + weights.win_rate_weight * win_rate
            + weights.sample_size_weight * coverage;
        Some(finite_or(raw, ZERO_FALLBACK))
    }
}

pub type HorizonMetricsMap = BTreeMap<usize, HorizonMetrics>;

/// Change in one horizon's metrics between two runs (`after - before`).
///
/// A field is `None` when either side is ineligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonDelta {
    pub horizon: usize,
    pub avg_return: Option<f64>,
    pub win_rate: Option<f64>,
    pub sharpe: Option<f64>,
}

pub type HorizonDeltaMap = BTreeMap<usize, HorizonDelta>;

/// Per-horizon `after - before` for every horizon in `before`.
pub fn horizon_delta(before: &HorizonMetricsMap, after: &HorizonMetricsMap) -> HorizonDeltaMap {
    let diff = |a: Option<f64>, b: Option<f64>| Some(finite_or(a? - b?, ZERO_FALLBACK));
    before
        .iter()
        .map(|(&h, old)| {
            let delta = match after.get(&h) {
                Some(new) => HorizonDelta {
                    horizon: h,
                    avg_return: diff(new.avg_return, old.avg_return),
                    win_rate: diff(new.win_rate, old.win_rate),
                    sharpe: diff(new.sharpe, old.sharpe),
                },
                None => HorizonDelta {
                    horizon: h,
                    avg_return: None,
                    win_rate: None,
                    sharpe: None,
                },
            };
            (h, delta)
        })
        .collect()
}

/// Signed forward returns of every position index whose `h`-period window fits.
pub fn horizon_returns(positions: &[f64], returns: &[f64], horizon: usize) -> Vec<f64> {
    let n = positions.len().min(returns.len());
    if horizon == 0 {
        return Vec::new();
    }
    (0..n)
        .filter(|&i| positions[i] != 0.0 && i + horizon < returns.len())
        .map(|i| {
            let sign = positions[i].signum();
            sign * returns[i..i + horizon].iter().sum::<f64>()
        })
        .collect()
}

fn metrics_for(sample: &[f64], horizon: usize, min_sample_size: usize) -> HorizonMetrics {
    let sample_size = sample.len();
    if sample_size < min_sample_size {
        return HorizonMetrics {
            horizon,
            sample_size,
            avg_return: None,
            win_rate: None,
            sharpe: None,
        };
    }
    HorizonMetrics {
        horizon,
        sample_size,
        avg_return: Some(stats::mean(sample)),
        win_rate: Some(stats::win_rate(sample)),
        sharpe: Some(stats::sharpe(sample)),
    }
}

/// Per-horizon metrics. Pure: never consults a cache.
pub fn compute_horizon_metrics(
    positions: &[f64],
    returns: &[f64],
    horizons: &[usize],
    min_sample_size: usize,
) -> Result<HorizonMetricsMap, SeriesError> {
    ensure_aligned("positions", positions.len(), "returns", returns.len())?;
    Ok(normalize_horizons(horizons)
        .into_iter()
        .filter(|&h| h > 0)
        .map(|h| {
            let sample = horizon_returns(positions, returns, h);
            (h, metrics_for(&sample, h, min_sample_size))
        })
        .collect())
}

/// Horizon with the highest weighted score among eligible horizons.
///
/// Ties resolve to the shortest horizon. `None` means insufficient data.
pub fn select_best_horizon(metrics: &HorizonMetricsMap, weights: &HorizonWeights) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    // BTreeMap iterates in ascending horizon order, so strict `>` keeps the shortest on ties.
    for (&h, m) in metrics {
        let Some(score) = m.score(weights) else {
            continue;
        };
        match best {
            Some((_, current)) if score <= current => {}
            _ => best = Some((h, score)),
        }
    }
    best.map(|(h, _)| h)
}

// ─── Analyzer ────────────────────────────────────────────────────────

/// Output of a full analyzer pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonAnalysis {
    pub metrics: HorizonMetricsMap,
    pub best_horizon: Option<usize>,
}

/// Validated horizon configuration with an optional shared cache.
#[derive(Debug, Clone)]
pub struct HorizonAnalyzer {
    config: HorizonConfig,
}

impl HorizonAnalyzer {
    pub fn new(config: HorizonConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HorizonConfig {
        &self.config
    }

    /// Compute metrics for every configured horizon, consulting `cache` first.
    pub fn compute(
        &self,
        positions: &[f64],
        returns: &[f64],
        cache: Option<&HorizonCache>,
    ) -> Result<HorizonMetricsMap, SeriesError> {
        ensure_aligned("positions", positions.len(), "returns", returns.len())?;
        let horizons = self.config.normalized_horizons();
        let min = self.config.min_sample_size;

        let Some(cache) = cache else {
            return compute_horizon_metrics(positions, returns, &horizons, min);
        };

        let key = HorizonCache::key(positions, returns, &horizons, min);
        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }
        let metrics = compute_horizon_metrics(positions, returns, &horizons, min)?;
        cache.insert(key, metrics.clone());
        Ok(metrics)
    }

    pub fn select_best(&self, metrics: &HorizonMetricsMap) -> Option<usize> {
        select_best_horizon(metrics, &self.config.weights)
    }

    pub fn analyze(
        &self,
        positions: &[f64],
        returns: &[f64],
        cache: Option<&HorizonCache>,
    ) -> Result<HorizonAnalysis, SeriesError> {
        let metrics = self.compute(positions, returns, cache)?;
        let best_horizon = self.select_best(&metrics);
        Ok(HorizonAnalysis {
            metrics,
            best_horizon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_positions_flip_sign() {
        let positions = [-1.0, 0.0, 1.0, 0.0];
        let returns = [-0.02, 0.01, 0.03, 0.0];
        let hr = horizon_returns(&positions, &returns, 1);
        assert_eq!(hr, vec![0.02, 0.03]);
    }

    #[test]
    fn window_must_fit_strictly_inside_series() {
        let positions = [1.0; 4];
        let returns = [0.01, 0.02, 0.03, 0.04];
        // i + 2 < 4 ⇒ i ∈ {0, 1}
        let hr = horizon_returns(&positions, &returns, 2);
        assert_eq!(hr.len(), 2);
        assert!((hr[0] - 0.03).abs() < 1e-12);
        assert!((hr[1] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn undersized_sample_reports_null_metrics() {
        let positions = [1.0; 10];
        let returns = [0.01; 10];
        let m = compute_horizon_metrics(&positions, &returns, &[1, 3], 20).unwrap();
        assert_eq!(m[&1].sample_size, 9);
        assert!(m[&1].avg_return.is_none());
        assert!(m[&1].sharpe.is_none());
        assert!(!m[&3].is_eligible());
        assert_eq!(select_best_horizon(&m, &HorizonWeights::default()), None);
    }

    #[test]
    fn zero_variance_sample_has_zero_sharpe() {
        let positions = [1.0; 30];
        let returns = [0.01; 30];
        let m = compute_horizon_metrics(&positions, &returns, &[1], 20).unwrap();
        assert_eq!(m[&1].sharpe, Some(0.0));
        assert_eq!(m[&1].win_rate, Some(1.0));
    }

    #[test]
    fn delta_is_null_where_either_side_is_ineligible() {
        let positions = [1.0; 6];
        let before = compute_horizon_metrics(&positions, &[0.01, 0.02, -0.01, 0.03, 0.0, 0.01], &[1, 4], 3).unwrap();
        let after = compute_horizon_metrics(&positions, &[0.01, 0.0, -0.01, 0.0, 0.0, 0.01], &[1, 4], 3).unwrap();
        let d = horizon_delta(&before, &after);

        assert_eq!(d.len(), 2);
        // h=1 covers indices 0..5: means 0.01 and 0.0
        assert!((d[&1].avg_return.unwrap() + 0.01).abs() < 1e-12);
        assert!((d[&1].win_rate.unwrap() + 0.4).abs() < 1e-12);
        // h=4 has only 2 windows, below the minimum of 3
        assert_eq!(d[&4].avg_return, None);
        assert_eq!(d[&4].sharpe, None);
    }

    #[test]
    fn length_mismatch_is_error() {
        let err = compute_horizon_metrics(&[1.0; 3], &[0.0; 4], &[1], 1).unwrap_err();
        assert!(matches!(err, SeriesError::LengthMismatch { .. }));
    }

    #[test]
    fn ties_go_to_shortest_horizon() {
        let mk = |h| HorizonMetrics {
            horizon: h,
            sample_size: 50,
            avg_return: Some(0.01),
            win_rate: Some(0.6),
            sharpe: Some(0.5),
        };
        let metrics: HorizonMetricsMap = [(5, mk(5)), (3, mk(3)), (10, mk(10))].into_iter().collect();
        assert_eq!(select_best_horizon(&metrics, &HorizonWeights::default()), Some(3));
    }

    #[test]
    fn weighted_score_not_single_metric() {
        let weights = HorizonWeights::default();
        let a = HorizonMetrics {
            horizon: 1,
            sample_size: 100,
            avg_return: Some(0.01),
            win_rate: Some(0.9),
            sharpe: Some(0.2),
        };
        let b = HorizonMetrics {
            horizon: 5,
            sample_size: 100,
            avg_return: Some(0.02),
            win_rate: Some(0.4),
            sharpe: Some(0.3),
        };
        // a: 0.12 + 0.27 + 0.1 = 0.49, b: 0.18 + 0.12 + 0.1 = 0.40
        let metrics: HorizonMetricsMap = [(1, a), (5, b)].into_iter().collect();
        assert_eq!(select_best_horizon(&metrics, &weights), Some(1));
    }

    #[test]
    fn config_validation() {
        assert!(HorizonConfig::default().validate().is_ok());
        let cfg = HorizonConfig {
            horizons: vec![],
            ..HorizonConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyHorizonSet));
        let cfg = HorizonConfig {
            horizons: vec![1, 0],
            ..HorizonConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroHorizon));
        let cfg = HorizonConfig {
            weights: HorizonWeights {
                sample_size_factor: 0.0,
                ..HorizonWeights::default()
            },
            ..HorizonConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidSampleSizeFactor(0.0)));
    }

    #[test]
    fn analyzer_uses_and_fills_cache() {
        let analyzer = HorizonAnalyzer::new(HorizonConfig {
            horizons: vec![1, 2],
            min_sample_size: 2,
            ..HorizonConfig::default()
        })
        .unwrap();
        let cache = HorizonCache::new(8, 2).unwrap();
        let positions = [0.0, 1.0, 1.0, -1.0, 1.0, 0.0];
        let returns = [0.01, 0.02, -0.01, -0.03, 0.02, 0.01];

        let first = analyzer.compute(&positions, &returns, Some(&cache)).unwrap();
        let second = analyzer.compute(&positions, &returns, Some(&cache)).unwrap();
        assert_eq!(first, second);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);

        let uncached = analyzer.compute(&positions, &returns, None).unwrap();
        assert_eq!(first, uncached);
    }
}
