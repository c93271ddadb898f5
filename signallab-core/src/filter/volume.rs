//! Volume floor filter — rejects signals printed on thin volume.

use crate::config::ConfigError;
use crate::domain::Signal;

use super::{missing_reason, FilterResult, SignalFilter};

pub const BELOW_VOLUME_FLOOR: &str = "below_volume_floor";

#[derive(Debug, Clone)]
pub struct VolumeFloorFilter {
    pub feature: String,
    pub min_volume: f64,
}

impl VolumeFloorFilter {
    pub fn new(feature: &str, min_volume: f64) -> Result<Self, ConfigError> {
        if feature.is_empty() {
            return Err(ConfigError::EmptyFeatureName);
        }
        if !min_volume.is_finite() || min_volume < 0.0 {
            return Err(ConfigError::InvalidVolumeFloor(min_volume));
        }
        Ok(Self {
            feature: feature.to_string(),
            min_volume,
        })
    }
}

impl SignalFilter for VolumeFloorFilter {
    fn name(&self) -> &str {
        "volume_floor"
    }

    fn required_feature(&self) -> Option<&str> {
        Some(&self.feature)
    }

    fn evaluate(&self, signal: &Signal) -> FilterResult {
        if signal.direction.is_flat() {
            return FilterResult::pass(self.name());
        }
        match signal.feature(&self.feature) {
            Some(v) if v >= self.min_volume => FilterResult::pass(self.name()),
            Some(_) => FilterResult::reject(self.name(), BELOW_VOLUME_FLOOR),
            None => FilterResult::reject(self.name(), missing_reason(&self.feature)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use chrono::NaiveDate;

    fn signal(volume: f64) -> Signal {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Signal::new(ts, Direction::Long, "s").with_feature("volume", volume)
    }

    #[test]
    fn passes_at_or_above_floor() {
        let f = VolumeFloorFilter::new("volume", 1_000.0).unwrap();
        assert!(f.evaluate(&signal(1_000.0)).passed);
        assert!(f.evaluate(&signal(5_000.0)).passed);
    }

    #[test]
    fn rejects_below_floor() {
        let f = VolumeFloorFilter::new("volume", 1_000.0).unwrap();
        let r = f.evaluate(&signal(999.0));
        assert_eq!(r.rejection_reason.as_deref(), Some(BELOW_VOLUME_FLOOR));
    }

    #[test]
    fn nan_volume_is_missing() {
        let f = VolumeFloorFilter::new("volume", 1_000.0).unwrap();
        let r = f.evaluate(&signal(f64::NAN));
        assert_eq!(r.rejection_reason.as_deref(), Some("missing_volume"));
    }

    #[test]
    fn negative_floor_is_config_error() {
        assert_eq!(
            VolumeFloorFilter::new("volume", -1.0).unwrap_err(),
            ConfigError::InvalidVolumeFloor(-1.0)
        );
    }
}
