//! Statistical performance divergence — dual-layer percentile exit signals.
//!
//! The observed position return is ranked against two reference
//! distributions: the instrument's own returns over comparable windows (asset
//! layer) and the strategy's completed trades (strategy layer). The higher of
//! the two ranks picks the exit signal; agreement between layers and the size
//! of the smaller reference set drive the confidence.
//!
//! Never fails at analysis time. Unusable references fall back to a 50th
//! percentile reading. A fallback layer never picks the signal and is left
//! out of the convergence check; with no usable layer the signal is
//! [`ExitSignalKind::Hold`] whatever the cut points.

pub mod bootstrap;
pub mod percentile;

use serde::{Deserialize, Serialize};

use crate::config::{check_unit, ConfigError};
use crate::fallback::{finite_or, PERCENTILE_FALLBACK};
use crate::rng::SeedHierarchy;
use crate::stats;

pub use bootstrap::{bootstrap_percentile, BootstrapEstimate, PercentileInterval, MIN_BOOTSTRAP_ITERATIONS};
pub use percentile::{percentile_of_score, percentile_rank, PercentileBounds};

const SEED_SCOPE: &str = "divergence";

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceConfig {
    pub sell: f64,
    pub strong_sell: f64,
    pub exit_immediately: f64,
    pub percentile_floor: f64,
    pub percentile_ceiling: f64,
    /// Percentile points within which the two layers count as converged.
    pub convergence_tolerance: f64,
    pub high_sample: usize,
    pub medium_sample: usize,
    pub low_sample: usize,
    /// Layers with fewer finite reference values than this are bootstrapped.
    pub bootstrap_below: usize,
    pub bootstrap_iterations: usize,
    pub seed: u64,
    pub high_confidence: f64,
    pub medium_confidence: f64,
    pub low_confidence: f64,
    pub insufficient_confidence: f64,
    pub convergence_bonus: f64,
    pub divergence_penalty: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            sell: 80.0,
            strong_sell: 90.0,
            exit_immediately: 95.0,
            percentile_floor: 1.0,
            percentile_ceiling: 99.0,
            convergence_tolerance: 5.0,
            high_sample: 30,
            medium_sample: 15,
            low_sample: 5,
            bootstrap_below: 15,
            bootstrap_iterations: 1000,
            seed: 42,
            high_confidence: 0.9,
            medium_confidence: 0.7,
            low_confidence: 0.5,
            insufficient_confidence: 0.3,
            convergence_bonus: 0.1,
            divergence_penalty: 0.15,
        }
    }
}

impl DivergenceConfig {
    pub fn bounds(&self) -> PercentileBounds {
        PercentileBounds {
            floor: self.percentile_floor,
            ceiling: self.percentile_ceiling,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = [self.sell, self.strong_sell, self.exit_immediately]
            .iter()
            .all(|v| v.is_finite())
            && 0.0 <= self.sell
            && self.sell < self.strong_sell
            && self.strong_sell < self.exit_immediately
            && self.exit_immediately <= 100.0;
        if !ordered {
            return Err(ConfigError::CutPointsNotOrdered {
                sell: self.sell,
                strong_sell: self.strong_sell,
                exit_immediately: self.exit_immediately,
            });
        }
        self.bounds().validate()?;
        if !self.convergence_tolerance.is_finite() || self.convergence_tolerance < 0.0 {
            return Err(ConfigError::InvalidConvergenceTolerance(self.convergence_tolerance));
        }
        if !(self.low_sample <= self.medium_sample && self.medium_sample <= self.high_sample) {
            return Err(ConfigError::TierThresholdsNotOrdered {
                low: self.low_sample,
                medium: self.medium_sample,
                high: self.high_sample,
            });
        }
        if self.bootstrap_iterations < MIN_BOOTSTRAP_ITERATIONS {
            return Err(ConfigError::TooFewBootstrapIterations {
                iterations: self.bootstrap_iterations,
                minimum: MIN_BOOTSTRAP_ITERATIONS,
            });
        }
        check_unit("high_confidence", self.high_confidence)?;
        check_unit("medium_confidence", self.medium_confidence)?;
        check_unit("low_confidence", self.low_confidence)?;
        check_unit("insufficient_confidence", self.insufficient_confidence)?;
        check_unit("convergence_bonus", self.convergence_bonus)?;
        check_unit("divergence_penalty", self.divergence_penalty)?;
        Ok(())
    }

    fn tier_for(&self, sample_size: usize) -> SampleTier {
        if sample_size >= self.high_sample {
            SampleTier::High
        } else if sample_size >= self.medium_sample {
            SampleTier::Medium
        } else if sample_size >= self.low_sample {
            SampleTier::Low
        } else {
            SampleTier::Insufficient
        }
    }

    fn base_confidence(&self, tier: SampleTier) -> f64 {
        match tier {
            SampleTier::High => self.high_confidence,
            SampleTier::Medium => self.medium_confidence,
            SampleTier::Low => self.low_confidence,
            SampleTier::Insufficient => self.insufficient_confidence,
        }
    }

    fn classify(&self, percentile: f64) -> ExitSignalKind {
        if percentile >= self.exit_immediately {
            ExitSignalKind::ExitImmediately
        } else if percentile >= self.strong_sell {
            ExitSignalKind::StrongSell
        } else if percentile >= self.sell {
            ExitSignalKind::Sell
        } else {
            ExitSignalKind::Hold
        }
    }
}

// ─── Output types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitSignalKind {
    ExitImmediately,
    StrongSell,
    Sell,
    Hold,
}

/// Reference-sample tier, strongest first. `Ord` ranks weaker tiers higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleTier {
    High,
    Medium,
    Low,
    Insufficient,
}

impl SampleTier {
    pub fn ci_level(self) -> f64 {
        match self {
            Self::High => 0.95,
            Self::Medium => 0.90,
            Self::Low | Self::Insufficient => 0.80,
        }
    }

    pub fn confidence_level(self) -> ConfidenceLevel {
        match self {
            Self::High => ConfidenceLevel::High,
            Self::Medium => ConfidenceLevel::Medium,
            Self::Low | Self::Insufficient => ConfidenceLevel::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

/// One layer's percentile reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerReading {
    pub percentile: f64,
    /// Finite reference values ranked against.
    pub sample_size: usize,
    pub tier: SampleTier,
    pub bootstrapped: bool,
    pub ci: Option<PercentileInterval>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSignal {
    pub kind: ExitSignalKind,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub ci_level: f64,
    pub converged: bool,
    /// Summed position return. `None` when there is no open position.
    pub observed: Option<f64>,
    pub asset: LayerReading,
    pub strategy: LayerReading,
}

impl ExitSignal {
    pub fn max_percentile(&self) -> f64 {
        self.asset.percentile.max(self.strategy.percentile)
    }
}

// ─── Engine ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DivergenceEngine {
    config: DivergenceConfig,
    seeds: SeedHierarchy,
}

impl DivergenceEngine {
    pub fn new(config: DivergenceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let seeds = SeedHierarchy::new(config.seed);
        Ok(Self { config, seeds })
    }

    pub fn config(&self) -> &DivergenceConfig {
        &self.config
    }

    /// Rank the open position's summed return against both references.
    pub fn analyze(
        &self,
        position_returns: &[f64],
        asset_distribution: &[f64],
        strategy_distribution: &[f64],
    ) -> ExitSignal {
        let observed = if position_returns.is_empty() {
            None
        } else {
            let sum: f64 = position_returns.iter().sum();
            sum.is_finite().then_some(sum)
        };

        let asset = self.layer("asset", asset_distribution, observed);
        let strategy = self.layer("strategy", strategy_distribution, observed);

        // A layer without reference data or observation carries no ranking.
        let usable = |layer: &LayerReading| observed.is_some() && layer.sample_size > 0;
        let (asset_usable, strategy_usable) = (usable(&asset), usable(&strategy));
        let both_usable = asset_usable && strategy_usable;
        let (kind, converged) = match (asset_usable, strategy_usable) {
            (true, true) => {
                let kind = self.config.classify(asset.percentile.max(strategy.percentile));
                (kind, self.converged(kind, &asset, &strategy))
            }
            (true, false) => (self.config.classify(asset.percentile), false),
            (false, true) => (self.config.classify(strategy.percentile), false),
            (false, false) => (ExitSignalKind::Hold, false),
        };

        let tier = asset.tier.max(strategy.tier);
        let base = self.config.base_confidence(tier);
        let mut confidence = match (both_usable, converged) {
            (false, _) => base,
            (true, true) => base + self.config.convergence_bonus,
            (true, false) => base - self.config.divergence_penalty,
        };
        if tier == SampleTier::Insufficient {
            confidence = confidence.min(self.config.insufficient_confidence);
        }
        let confidence = finite_or(confidence, 0.0).clamp(0.0, 1.0);

        tracing::debug!(
            ?kind,
            asset = asset.percentile,
            strategy = strategy.percentile,
            confidence,
            "divergence analysis"
        );

        ExitSignal {
            kind,
            confidence,
            confidence_level: tier.confidence_level(),
            ci_level: tier.ci_level(),
            converged,
            observed,
            asset,
            strategy,
        }
    }

    fn layer(&self, label: &str, reference: &[f64], observed: Option<f64>) -> LayerReading {
        let finite = stats::sorted_finite(reference);
        let sample_size = finite.len();
        let tier = self.config.tier_for(sample_size);
        let bounds = self.config.bounds();

        let fallback = LayerReading {
            percentile: PERCENTILE_FALLBACK,
            sample_size,
            tier,
            bootstrapped: false,
            ci: None,
        };
        let Some(value) = observed else {
            return fallback;
        };
        if sample_size == 0 {
            return fallback;
        }

        if sample_size < self.config.bootstrap_below {
            let mut rng = self.seeds.rng_for(SEED_SCOPE, label);
            if let Some(est) = bootstrap_percentile(
                &finite,
                value,
                self.config.bootstrap_iterations,
                tier.ci_level(),
                &bounds,
                &mut rng,
            ) {
                return LayerReading {
                    percentile: est.percentile,
                    sample_size,
                    tier,
                    bootstrapped: true,
                    ci: Some(est.interval),
                };
            }
        }

        LayerReading {
            percentile: percentile_rank(&finite, value, &bounds),
            ..fallback
        }
    }

    /// Both usable layers at or above the chosen signal's cut point, or within the
    /// tolerance of each other. A hold converges when both layers sit below
    /// the sell cut point.
    fn converged(&self, kind: ExitSignalKind, asset: &LayerReading, strategy: &LayerReading) -> bool {
        if (asset.percentile - strategy.percentile).abs() <= self.config.convergence_tolerance {
            return true;
        }
        match kind {
            ExitSignalKind::ExitImmediately => {
                asset.percentile >= self.config.exit_immediately
                    && strategy.percentile >= self.config.exit_immediately
            }
            ExitSignalKind::StrongSell => {
                asset.percentile >= self.config.strong_sell
                    && strategy.percentile >= self.config.strong_sell
            }
            ExitSignalKind::Sell => {
                asset.percentile >= self.config.sell && strategy.percentile >= self.config.sell
            }
            ExitSignalKind::Hold => {
                asset.percentile < self.config.sell && strategy.percentile < self.config.sell
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DivergenceEngine {
        DivergenceEngine::new(DivergenceConfig::default()).unwrap()
    }

    fn spread(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 / n as f64 * 0.1 - 0.05).collect()
    }

    #[test]
    fn empty_position_holds() {
        let sig = engine().analyze(&[], &spread(40), &spread(40));
        assert_eq!(sig.kind, ExitSignalKind::Hold);
        assert_eq!(sig.asset.percentile, 50.0);
        assert_eq!(sig.strategy.percentile, 50.0);
        assert!(sig.observed.is_none());
    }

    #[test]
    fn extreme_return_on_large_samples_exits() {
        let sig = engine().analyze(&[0.2], &spread(40), &spread(60));
        assert_eq!(sig.kind, ExitSignalKind::ExitImmediately);
        assert_eq!(sig.asset.percentile, 99.0);
        assert!(sig.converged);
        assert_eq!(sig.confidence_level, ConfidenceLevel::High);
        assert!((sig.confidence - 1.0).abs() < 1e-12);
        assert_eq!(sig.ci_level, 0.95);
        assert!(!sig.asset.bootstrapped);
    }

    #[test]
    fn cut_points_map_to_signals() {
        let cfg = DivergenceConfig::default();
        assert_eq!(cfg.classify(95.0), ExitSignalKind::ExitImmediately);
        assert_eq!(cfg.classify(94.9), ExitSignalKind::StrongSell);
        assert_eq!(cfg.classify(90.0), ExitSignalKind::StrongSell);
        assert_eq!(cfg.classify(80.0), ExitSignalKind::Sell);
        assert_eq!(cfg.classify(79.9), ExitSignalKind::Hold);
    }

    #[test]
    fn tiny_reference_forces_low_confidence() {
        let sig = engine().analyze(&[0.5], &[0.01; 4], &[0.01; 4]);
        assert_eq!(sig.asset.percentile, 99.0);
        assert!(sig.asset.bootstrapped);
        assert_eq!(sig.asset.tier, SampleTier::Insufficient);
        assert_eq!(sig.confidence_level, ConfidenceLevel::Low);
        assert!(sig.confidence <= 0.3 + 1e-12);
    }

    #[test]
    fn divergent_layers_lower_confidence() {
        // asset layer extreme, strategy layer middling
        let strategy: Vec<f64> = (0..40).map(|i| i as f64 * 0.01).collect();
        let sig = engine().analyze(&[0.2], &spread(40), &strategy);
        assert_eq!(sig.kind, ExitSignalKind::ExitImmediately);
        assert!(!sig.converged);
        assert!((sig.confidence - 0.75).abs() < 1e-12);
    }

    #[test]
    fn overall_tier_is_weaker_layer() {
        let sig = engine().analyze(&[0.0], &spread(40), &spread(20));
        assert_eq!(sig.asset.tier, SampleTier::High);
        assert_eq!(sig.strategy.tier, SampleTier::Medium);
        assert_eq!(sig.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(sig.ci_level, 0.90);
    }

    #[test]
    fn analysis_is_deterministic() {
        let reference = [-0.02, 0.01, 0.03, -0.01, 0.02, 0.0, 0.015];
        let a = engine().analyze(&[0.012], &reference, &reference);
        let b = engine().analyze(&[0.012], &reference, &reference);
        assert_eq!(a, b);
    }

    #[test]
    fn nan_reference_falls_back() {
        let sig = engine().analyze(&[0.01], &[f64::NAN; 10], &[]);
        assert_eq!(sig.asset.percentile, 50.0);
        assert_eq!(sig.asset.sample_size, 0);
        assert_eq!(sig.kind, ExitSignalKind::Hold);
    }

    #[test]
    fn degenerate_input_holds_below_fallback_cut() {
        let low = DivergenceEngine::new(DivergenceConfig {
            sell: 40.0,
            ..DivergenceConfig::default()
        })
        .unwrap();
        for sig in [
            low.analyze(&[], &[], &[]),
            low.analyze(&[], &spread(40), &spread(40)),
            low.analyze(&[0.01], &[], &[f64::NAN; 3]),
        ] {
            assert_eq!(sig.kind, ExitSignalKind::Hold);
            assert_eq!(sig.max_percentile(), 50.0);
            assert!(!sig.converged);
        }
    }

    #[test]
    fn empty_layer_is_left_out_of_convergence() {
        // always-in strategy: no closed trades, so no strategy reference
        let sig = engine().analyze(&[0.5], &spread(200), &[]);
        assert_eq!(sig.asset.percentile, 99.0);
        assert_eq!(sig.strategy.percentile, 50.0);
        assert_eq!(sig.kind, ExitSignalKind::ExitImmediately);
        assert!(!sig.converged);
        // no divergence penalty, still capped by the insufficient tier
        assert!((sig.confidence - 0.3).abs() < 1e-12);
        assert_eq!(sig.confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn config_validation() {
        assert!(DivergenceConfig::default().validate().is_ok());
        let cfg = DivergenceConfig {
            sell: 92.0,
            ..DivergenceConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::CutPointsNotOrdered { .. })));
        let cfg = DivergenceConfig {
            bootstrap_iterations: 100,
            ..DivergenceConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::TooFewBootstrapIterations {
                iterations: 100,
                minimum: 500
            })
        );
        let cfg = DivergenceConfig {
            low_sample: 20,
            ..DivergenceConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::TierThresholdsNotOrdered { .. })));
    }
}
