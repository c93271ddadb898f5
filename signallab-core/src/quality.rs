//! Composite signal-quality score on a 0–10 scale.
//!
//! ```text
//! score = scale * ( w_wr * win_rate
//!                 + w_pf * min(profit_factor, pf_cap) / pf_cap
//!                 + w_rr * avg_return / max(|avg_loss|, loss_floor)
//!                 + w_hq * [avg_return > 0] )
//! ```
//!
//! Independent of the best-horizon score; the two are configured separately.

use serde::{Deserialize, Serialize};

use crate::config::{check_weight, ConfigError};
use crate::fallback::{finite_or, ZERO_FALLBACK};
use crate::metrics::PerformanceSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub risk_reward: f64,
    pub horizon_quality: f64,
    pub profit_factor_cap: f64,
    pub loss_floor: f64,
    pub scale: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            win_rate: 0.4,
            profit_factor: 0.3,
            risk_reward: 0.2,
            horizon_quality: 0.1,
            profit_factor_cap: 5.0,
            loss_floor: 1e-3,
            scale: 10.0,
        }
    }
}

impl QualityWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_weight("quality.win_rate", self.win_rate)?;
        check_weight("quality.profit_factor", self.profit_factor)?;
        check_weight("quality.risk_reward", self.risk_reward)?;
        check_weight("quality.horizon_quality", self.horizon_quality)?;
        for (name, value) in [
            ("quality.profit_factor_cap", self.profit_factor_cap),
            ("quality.loss_floor", self.loss_floor),
            ("quality.scale", self.scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        Ok(())
    }
}

/// Weighted contributions, each already multiplied by `scale`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityComponents {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub risk_reward: f64,
    pub horizon_quality: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Clamped to `[0, scale]`.
    pub score: f64,
    /// Upper end of the scale the score was computed on.
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub components: QualityComponents,
}

fn default_scale() -> f64 {
    QualityWeights::default().scale
}

impl QualityScore {
    /// Grade cut-offs are fractions of `scale`: 0.8, 0.6 and 0.4.
    pub fn grade(&self) -> QualityGrade {
        let fraction = if self.scale > 0.0 { self.score / self.scale } else { 0.0 };
        match fraction {
            f if f >= 0.8 => QualityGrade::Excellent,
            f if f >= 0.6 => QualityGrade::Good,
            f if f >= 0.4 => QualityGrade::Fair,
            _ => QualityGrade::Poor,
        }
    }
}

/// Score a metrics snapshot. Pure and total: never NaN, never outside the range.
pub fn score_quality(metrics: &PerformanceSnapshot, weights: &QualityWeights) -> QualityScore {
    let clean = |v: f64| finite_or(v, ZERO_FALLBACK);
    let win_rate = clean(metrics.win_rate);
    // +inf (no losing trades) saturates at the cap; NaN contributes nothing.
    let profit_factor = if metrics.profit_factor.is_nan() {
        ZERO_FALLBACK
    } else {
        metrics.profit_factor.max(0.0)
    };
    let avg_return = clean(metrics.avg_return);
    let avg_loss = clean(metrics.avg_loss);

    let pf_term = profit_factor.min(weights.profit_factor_cap) / weights.profit_factor_cap;
    let rr_term = avg_return / avg_loss.abs().max(weights.loss_floor);
    let hq_term = if avg_return > 0.0 { 1.0 } else { 0.0 };

    let components = QualityComponents {
        win_rate: clean(weights.scale * weights.win_rate * win_rate),
        profit_factor: clean(weights.scale * weights.profit_factor * pf_term),
        risk_reward: clean(weights.scale * weights.risk_reward * rr_term),
        horizon_quality: clean(weights.scale * weights.horizon_quality * hq_term),
    };
    let total = components.win_rate
        + components.profit_factor
        + components.risk_reward
        + components.horizon_quality;

    QualityScore {
        score: clean(total).clamp(0.0, weights.scale.max(0.0)),
        scale: weights.scale,
        components,
    }
}
