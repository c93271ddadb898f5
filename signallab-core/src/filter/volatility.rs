//! Volatility band filter - gates signals by ATR level.
//!
//! Passes signals when ATR lies within `[min_atr, max_atr]`. Rejects in
//! extremely low-vol (no movement) or extremely high-vol (erratic) conditions.

use crate::config::ConfigError;
use crate::domain::Signal;

use super::{missing_reason, FilterResult, SignalFilter};

pub const BELOW_MIN_ATR: &str = "below_min_atr";
pub const ABOVE_MAX_ATR: &str = "above_max_atr";

#[derive(Debug, Clone)]
pub struct VolatilityBandFilter {
    pub feature: String,
    pub min_atr: f64,
    pub max_atr: f64,
}

impl VolatilityBandFilter {
    pub fn new(feature: &str, min_atr: f64, max_atr: f64) -> Result<Self, ConfigError> {
        if feature.is_empty() {
            return Err(ConfigError::EmptyFeatureName);
        }
        if !min_atr.is_finite() || !max_atr.is_finite() || min_atr < 0.0 || min_atr > max_atr {
            return Err(ConfigError::InvalidAtrBand {
                min: min_atr,
                max: max_atr,
            });
        }
        Ok(Self {
            feature: feature.to_string(),
            min_atr,
            max_atr,
        })
    }
}

impl SignalFilter for VolatilityBandFilter {
    fn name(&self) -> &str {
        "volatility_band"
    }

    fn required_feature(&self) -> Option<&str> {
        Some(&self.feature)
    }

    fn evaluate(&self, signal: &Signal) -> FilterResult {
        if signal.direction.is_flat() {
            return FilterResult::pass(self.name());
        }
        match signal.feature(&self.feature) {
            Some(atr) if atr < self.min_atr => FilterResult::reject(self.name(), BELOW_MIN_ATR),
            Some(atr) if atr > self.max_atr => FilterResult::reject(self.name(), ABOVE_MAX_ATR),
            Some(_) => FilterResult::pass(self.name()),
            None => FilterResult::reject(self.name(), missing_reason(&self.feature)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use chrono::NaiveDate;

    fn signal(atr: f64) -> Signal {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Signal::new(ts, Direction::Short, "s").with_feature("atr", atr)
    }

    #[test]
    fn passes_within_band() {
        let f = VolatilityBandFilter::new("atr", 0.5, 5.0).unwrap();
        assert!(f.evaluate(&signal(2.0)).passed);
    }

    #[test]
    fn passes_at_boundaries() {
        let f = VolatilityBandFilter::new("atr", 0.5, 5.0).unwrap();
        assert!(f.evaluate(&signal(0.5)).passed);
        assert!(f.evaluate(&signal(5.0)).passed);
    }

    #[test]
    fn rejects_too_low_and_too_high() {
        let f = VolatilityBandFilter::new("atr", 0.5, 5.0).unwrap();
        assert_eq!(
            f.evaluate(&signal(0.1)).rejection_reason.as_deref(),
            Some(BELOW_MIN_ATR)
        );
        assert_eq!(
            f.evaluate(&signal(10.0)).rejection_reason.as_deref(),
            Some(ABOVE_MAX_ATR)
        );
    }

    #[test]
    fn nan_guard() {
        let f = VolatilityBandFilter::new("atr", 0.5, 5.0).unwrap();
        assert!(!f.evaluate(&signal(f64::NAN)).passed);
    }

    #[test]
    fn inverted_band_rejected() {
        assert!(VolatilityBandFilter::new("atr", 5.0, 0.5).is_err());
        assert!(VolatilityBandFilter::new("atr", -1.0, 0.5).is_err());
    }
}
