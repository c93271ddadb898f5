use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ConfigError;
use crate::domain::Signal;

use super::{FilterConfig, SignalFilter};

/// Per-stage counts for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStageStats {
    pub filter_name: String,
    pub input_count: usize,
    pub output_count: usize,
    /// Rejection count per reason string.
    pub rejections: BTreeMap<String, usize>,
    /// True when the filter's column was absent from every surviving signal.
    pub skipped: bool,
}

impl FilterStageStats {
    pub fn rejected(&self) -> usize {
        self.input_count - self.output_count
    }
}

/// Audit trail of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterAudit {
    pub total_in: usize,
    pub total_out: usize,
    pub per_filter: Vec<FilterStageStats>,
}

impl FilterAudit {
    /// Flattened rejection counts keyed `"{filter_name}:{reason}"`.
    pub fn rejection_buckets(&self) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        for stage in &self.per_filter {
            for (reason, count) in &stage.rejections {
                *out.entry(format!("{}:{}", stage.filter_name, reason))
                    .or_insert(0) += count;
            }
        }
        out
    }

    pub fn total_rejected(&self) -> usize {
        self.total_in - self.total_out
    }

    /// Fraction of input signals that survived. 1.0 for an empty batch.
    pub fn pass_rate(&self) -> f64 {
        if self.total_in == 0 {
            1.0
        } else {
            self.total_out as f64 / self.total_in as f64
        }
    }
}

/// Ordered chain of filters.
///
/// Stage `k` only sees the signals that passed stages `0..k`. Filters never
/// mutate signals; the pipeline returns a survivor set plus an audit.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn SignalFilter>>,
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPipeline")
            .field("filters", &self.names())
            .finish()
    }
}

impl FilterPipeline {
    pub fn new(filters: Vec<Box<dyn SignalFilter>>) -> Self {
        Self { filters }
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let filters = config
            .filters
            .iter()
            .map(|spec| spec.build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filters })
    }

    /// Append a stage at the end of the chain.
    pub fn push(&mut self, filter: Box<dyn SignalFilter>) {
        self.filters.push(filter);
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run the chain and return the surviving signals in input order.
    pub fn apply(&self, signals: &[Signal]) -> (Vec<Signal>, FilterAudit) {
        let (mask, audit) = self.apply_mask(signals);
        let survivors = signals
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|(s, _)| s.clone())
            .collect();
        (survivors, audit)
    }

    /// Run the chain and return a keep-mask aligned with the input.
    pub fn apply_mask(&self, signals: &[Signal]) -> (Vec<bool>, FilterAudit) {
        let mut alive = vec![true; signals.len()];
        let mut alive_count = signals.len();
        let mut per_filter = Vec::with_capacity(self.filters.len());

        for filter in &self.filters {
            let mut stats = FilterStageStats {
                filter_name: filter.name().to_string(),
                input_count: alive_count,
                output_count: alive_count,
                ..FilterStageStats::default()
            };

            if let Some(feature) = filter.required_feature() {
                let present = signals
                    .iter()
                    .zip(&alive)
                    .any(|(s, &a)| a && s.has_feature(feature));
                if !present {
                    if alive_count > 0 {
                        tracing::warn!(
                            filter = filter.name(),
                            feature,
                            "feature column absent from all signals, skipping filter"
                        );
                    }
                    stats.skipped = true;
                    per_filter.push(stats);
                    continue;
                }
            }

            for (signal, keep) in signals.iter().zip(alive.iter_mut()) {
                if !*keep {
                    continue;
                }
                let verdict = filter.evaluate(signal);
                if !verdict.passed {
                    *keep = false;
                    alive_count -= 1;
                    let reason = verdict
                        .rejection_reason
                        .unwrap_or_else(|| "rejected".to_string());
                    *stats.rejections.entry(reason).or_insert(0) += 1;
                }
            }
            stats.output_count = alive_count;

            tracing::debug!(
                filter = %stats.filter_name,
                input = stats.input_count,
                output = stats.output_count,
                "filter stage complete"
            );
            per_filter.push(stats);
        }

        let audit = FilterAudit {
            total_in: signals.len(),
            total_out: alive_count,
            per_filter,
        };
        (alive, audit)
    }
}
