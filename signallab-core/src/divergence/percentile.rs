//! Rank-based percentile-of-score.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::fallback::PERCENTILE_FALLBACK;

/// Clamp bounds applied to every reported percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileBounds {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for PercentileBounds {
    fn default() -> Self {
        Self {
            floor: 1.0,
            ceiling: 99.0,
        }
    }
}

impl PercentileBounds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = self.floor.is_finite()
            && self.ceiling.is_finite()
            && self.floor >= 0.0
            && self.ceiling <= 100.0
            && self.floor < self.ceiling;
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidPercentileBounds {
                floor: self.floor,
                ceiling: self.ceiling,
            })
        }
    }

    pub fn clamp(&self, percentile: f64) -> f64 {
        percentile.clamp(self.floor, self.ceiling)
    }
}

/// Weak percentile-of-score: `100 * count(x <= value) / n` over the finite
/// reference values. `None` when there is nothing to rank against.
pub fn percentile_of_score(reference: &[f64], value: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let (n, at_or_below) = reference
        .iter()
        .filter(|v| v.is_finite())
        .fold((0usize, 0usize), |(n, k), &v| (n + 1, k + usize::from(v <= value)));
    if n == 0 {
        return None;
    }
    Some(100.0 * at_or_below as f64 / n as f64)
}

/// Clamped percentile rank with the 50.0 fallback for unusable input.
pub fn percentile_rank(reference: &[f64], value: f64, bounds: &PercentileBounds) -> f64 {
    match percentile_of_score(reference, value) {
        Some(p) => bounds.clamp(p),
        None => PERCENTILE_FALLBACK,
    }
}
