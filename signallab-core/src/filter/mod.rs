//! Signal filter pipeline — gates raw signals before any return analysis.
//!
//! Filters are applied strictly in configured order; each filter sees only the
//! signals that survived the filters before it. Every verdict is recorded in a
//! [`FilterAudit`] so a caller can answer "why was this signal removed".

pub mod pipeline;
pub mod threshold;
pub mod volatility;
pub mod volume;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::Signal;

pub use pipeline::{FilterAudit, FilterPipeline, FilterStageStats};
pub use threshold::ThresholdFilter;
pub use volatility::VolatilityBandFilter;
pub use volume::VolumeFloorFilter;

/// Verdict of one filter on one signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResult {
    pub passed: bool,
    pub rejection_reason: Option<String>,
    pub filter_name: String,
}

impl FilterResult {
    pub fn pass(filter_name: &str) -> Self {
        Self {
            passed: true,
            rejection_reason: None,
            filter_name: filter_name.to_string(),
        }
    }

    pub fn reject(filter_name: &str, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            rejection_reason: Some(reason.into()),
            filter_name: filter_name.to_string(),
        }
    }
}

/// Trait for signal filters.
///
/// Filters look at one signal row at a time. They must be deterministic so
/// that re-running a pipeline over its own output rejects nothing further.
pub trait SignalFilter: Send + Sync {
    /// Stable name used in audit buckets (e.g. "threshold_rsi", "volume_floor").
    fn name(&self) -> &str;

    /// Raw feature this filter reads. When no signal in a batch carries it,
    /// the pipeline skips the filter instead of rejecting everything.
    fn required_feature(&self) -> Option<&str>;

    /// Evaluate a single signal.
    fn evaluate(&self, signal: &Signal) -> FilterResult;
}

/// Reason string used when a row lacks a finite value for a present column.
pub fn missing_reason(feature: &str) -> String {
    format!("missing_{feature}")
}

fn default_volume_feature() -> String {
    "volume".to_string()
}

fn default_atr_feature() -> String {
    "atr".to_string()
}

/// Serializable description of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    /// Direction-aware bound on an indicator: longs rejected above `long_max`,
    /// shorts rejected below `short_min`.
    Threshold {
        feature: String,
        long_max: f64,
        short_min: f64,
    },
    /// Reject signals whose volume is below `min_volume`.
    VolumeFloor {
        #[serde(default = "default_volume_feature")]
        feature: String,
        min_volume: f64,
    },
    /// Reject signals whose ATR is outside `[min_atr, max_atr]`.
    VolatilityBand {
        #[serde(default = "default_atr_feature")]
        feature: String,
        min_atr: f64,
        max_atr: f64,
    },
}

impl FilterSpec {
    /// Build the concrete filter, validating its parameters.
    pub fn build(&self) -> Result<Box<dyn SignalFilter>, ConfigError> {
        Ok(match self {
            Self::Threshold {
                feature,
                long_max,
                short_min,
            } => Box::new(ThresholdFilter::new(feature, *long_max, *short_min)?),
            Self::VolumeFloor {
                feature,
                min_volume,
            } => Box::new(VolumeFloorFilter::new(feature, *min_volume)?),
            Self::VolatilityBand {
                feature,
                min_atr,
                max_atr,
            } => Box::new(VolatilityBandFilter::new(feature, *min_atr, *max_atr)?),
        })
    }
}

/// Ordered filter chain configuration. Empty by default (everything passes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub filters: Vec<FilterSpec>,
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for spec in &self.filters {
            spec.build()?;
        }
        Ok(())
    }
}
