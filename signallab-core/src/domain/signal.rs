use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::SeriesError;

/// Directional intent of a signal or position.
///
/// Serialized as the integer `-1`, `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Direction {
    Short,
    #[default]
    Flat,
    Long,
}

impl Direction {
    /// -1.0, 0.0 or 1.0.
    pub fn sign(self) -> f64 {
        match self {
            Self::Short => -1.0,
            Self::Flat => 0.0,
            Self::Long => 1.0,
        }
    }

    /// Direction of a signed exposure. Zero and non-finite map to `Flat`.
    pub fn from_exposure(exposure: f64) -> Self {
        if exposure > 0.0 {
            Self::Long
        } else if exposure < 0.0 {
            Self::Short
        } else {
            Self::Flat
        }
    }

    pub fn is_flat(self) -> bool {
        matches!(self, Self::Flat)
    }
}

impl TryFrom<i64> for Direction {
    type Error = SeriesError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Short),
            0 => Ok(Self::Flat),
            1 => Ok(Self::Long),
            other => Err(SeriesError::InvalidDirection(other)),
        }
    }
}

impl From<Direction> for i64 {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Short => -1,
            Direction::Flat => 0,
            Direction::Long => 1,
        }
    }
}

/// A raw directional signal produced by strategy rule evaluation.
///
/// Immutable once generated: filters evaluate signals and record verdicts
/// separately, they never rewrite them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: NaiveDateTime,
    pub direction: Direction,
    pub strategy_id: String,
    /// Indicator snapshot at signal time (momentum, volume, atr, ...).
    #[serde(default)]
    pub raw_features: BTreeMap<String, f64>,
}

impl Signal {
    pub fn new(timestamp: NaiveDateTime, direction: Direction, strategy_id: impl Into<String>) -> Self {
        Self {
            timestamp,
            direction,
            strategy_id: strategy_id.into(),
            raw_features: BTreeMap::new(),
        }
    }

    /// Builder-style feature attachment.
    pub fn with_feature(mut self, key: impl Into<String>, value: f64) -> Self {
        self.raw_features.insert(key.into(), value);
        self
    }

    /// Finite feature value, if present.
    pub fn feature(&self, key: &str) -> Option<f64> {
        self.raw_features.get(key).copied().filter(|v| v.is_finite())
    }

    pub fn has_feature(&self, key: &str) -> bool {
        self.raw_features.contains_key(key)
    }
}
