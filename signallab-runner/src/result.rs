//! Analysis results, one outcome per strategy.

use serde::{Deserialize, Serialize};

use signallab_core::divergence::ExitSignal;
use signallab_core::filter::FilterAudit;
use signallab_core::horizon::HorizonMetricsMap;
use signallab_core::metrics::PerformanceSnapshot;
use signallab_core::quality::QualityScore;
use signallab_core::stop_loss::StopLossAdjustment;

use crate::orchestrator::AnalysisError;

/// Everything computed for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAnalysis {
    pub strategy_id: String,
    pub filter_audit: FilterAudit,
    pub horizon_metrics: HorizonMetricsMap,
    /// `None` when no horizon had enough samples.
    pub best_horizon: Option<usize>,
    pub performance: PerformanceSnapshot,
    pub quality: QualityScore,
    pub stop_loss: Option<StopLossAdjustment>,
    pub exit_signal: ExitSignal,
    /// Insufficient-data conditions, each naming the sample size involved.
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Input,
    Config,
    TimedOut,
    /// The worker pool could not run the strategy.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&AnalysisError> for StrategyFailure {
    fn from(err: &AnalysisError) -> Self {
        let kind = match err {
            AnalysisError::Config(_) => FailureKind::Config,
            AnalysisError::TimedOut { .. } => FailureKind::TimedOut,
            AnalysisError::WorkerPool(_) | AnalysisError::WorkerLost => FailureKind::Internal,
            AnalysisError::Series(_) | AnalysisError::EmptyPortfolio | AnalysisError::NotAStrategy => {
                FailureKind::Input
            }
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Outcome for one strategy: exactly one of `analysis` / `failure` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub strategy_id: String,
    pub analysis: Option<StrategyAnalysis>,
    pub failure: Option<StrategyFailure>,
}

impl StrategyOutcome {
    pub fn from_result(strategy_id: String, result: Result<StrategyAnalysis, AnalysisError>) -> Self {
        match result {
            Ok(analysis) => Self {
                strategy_id,
                analysis: Some(analysis),
                failure: None,
            },
            Err(err) => Self {
                strategy_id,
                analysis: None,
                failure: Some(StrategyFailure::from(&err)),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.analysis.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub request_id: String,
    pub outcomes: Vec<StrategyOutcome>,
}

impl AnalysisResult {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
