//! Threshold filter — direction-aware bound on a momentum-style indicator.
//!
//! Longs are rejected when the indicator is above `long_max` (already
//! stretched upward); shorts are rejected when it is below `short_min`.

use crate::config::{check_finite, ConfigError};
use crate::domain::{Direction, Signal};

use super::{missing_reason, FilterResult, SignalFilter};

pub const ABOVE_LONG_THRESHOLD: &str = "above_long_threshold";
pub const BELOW_SHORT_THRESHOLD: &str = "below_short_threshold";

#[derive(Debug, Clone)]
pub struct ThresholdFilter {
    pub feature: String,
    pub long_max: f64,
    pub short_min: f64,
    name: String,
}

impl ThresholdFilter {
    pub fn new(feature: &str, long_max: f64, short_min: f64) -> Result<Self, ConfigError> {
        if feature.is_empty() {
            return Err(ConfigError::EmptyFeatureName);
        }
        check_finite("long_max", long_max)?;
        check_finite("short_min", short_min)?;
        Ok(Self {
            feature: feature.to_string(),
            long_max,
            short_min,
            name: format!("threshold_{feature}"),
        })
    }

    /// RSI-style defaults: no longs above 70, no shorts below 30.
    pub fn rsi_default() -> Self {
        Self {
            feature: "rsi".into(),
            long_max: 70.0,
            short_min: 30.0,
            name: "threshold_rsi".into(),
        }
    }
}

impl SignalFilter for ThresholdFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_feature(&self) -> Option<&str> {
        Some(&self.feature)
    }

    fn evaluate(&self, signal: &Signal) -> FilterResult {
        if signal.direction.is_flat() {
            return FilterResult::pass(&self.name);
        }
        let Some(value) = signal.feature(&self.feature) else {
            return FilterResult::reject(&self.name, missing_reason(&self.feature));
        };
        match signal.direction {
            Direction::Long if value > self.long_max => {
                FilterResult::reject(&self.name, ABOVE_LONG_THRESHOLD)
            }
            Direction::Short if value < self.short_min => {
                FilterResult::reject(&self.name, BELOW_SHORT_THRESHOLD)
            }
            _ => FilterResult::pass(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn signal(direction: Direction, rsi: Option<f64>) -> Signal {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let s = Signal::new(ts, direction, "momo");
        match rsi {
            Some(v) => s.with_feature("rsi", v),
            None => s,
        }
    }

    #[test]
    fn long_rejected_above_bound() {
        let f = ThresholdFilter::rsi_default();
        let r = f.evaluate(&signal(Direction::Long, Some(75.0)));
        assert!(!r.passed);
        assert_eq!(r.rejection_reason.as_deref(), Some(ABOVE_LONG_THRESHOLD));
    }

    #[test]
    fn long_passes_at_bound() {
        let f = ThresholdFilter::rsi_default();
        assert!(f.evaluate(&signal(Direction::Long, Some(70.0))).passed);
        assert!(f.evaluate(&signal(Direction::Long, Some(20.0))).passed);
    }

    #[test]
    fn short_rejected_below_bound() {
        let f = ThresholdFilter::rsi_default();
        let r = f.evaluate(&signal(Direction::Short, Some(25.0)));
        assert_eq!(r.rejection_reason.as_deref(), Some(BELOW_SHORT_THRESHOLD));
        assert!(f.evaluate(&signal(Direction::Short, Some(80.0))).passed);
    }

    #[test]
    fn flat_always_passes() {
        let f = ThresholdFilter::rsi_default();
        assert!(f.evaluate(&signal(Direction::Flat, None)).passed);
        assert!(f.evaluate(&signal(Direction::Flat, Some(99.0))).passed);
    }

    #[test]
    fn missing_value_rejected() {
        let f = ThresholdFilter::rsi_default();
        let r = f.evaluate(&signal(Direction::Long, None));
        assert_eq!(r.rejection_reason.as_deref(), Some("missing_rsi"));
    }

    #[test]
    fn name_includes_feature() {
        let f = ThresholdFilter::new("roc", 0.1, -0.1).unwrap();
        assert_eq!(f.name(), "threshold_roc");
        assert_eq!(f.required_feature(), Some("roc"));
    }

    #[test]
    fn rejects_non_finite_bounds() {
        assert!(ThresholdFilter::new("rsi", f64::NAN, 30.0).is_err());
        assert_eq!(
            ThresholdFilter::new("", 70.0, 30.0).unwrap_err(),
            ConfigError::EmptyFeatureName
        );
    }
}
