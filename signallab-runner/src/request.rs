//! Analysis requests: which strategies to analyze and where their returns come from.

use serde::{Deserialize, Serialize};

use signallab_core::domain::{ensure_aligned, ReturnSeries, SeriesError, Signal};

/// How the per-period instrument returns are supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DataSource {
    /// Per-period returns aligned one-to-one with the signals.
    TradeHistory { returns: Vec<f64> },
    /// Equity values, one more than there are signals.
    EquityCurve { equity: Vec<f64> },
}

impl DataSource {
    /// Validated return series aligned with `signal_count`.
    pub fn to_returns(&self, signal_count: usize) -> Result<ReturnSeries, SeriesError> {
        let series = match self {
            Self::TradeHistory { returns } => ReturnSeries::new(returns.clone())?,
            Self::EquityCurve { equity } => ReturnSeries::from_equity_curve(equity)?,
        };
        ensure_aligned("signals", signal_count, "returns", series.len())?;
        Ok(series)
    }
}

/// One strategy's inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyInput {
    pub strategy_id: String,
    pub signals: Vec<Signal>,
    pub source: DataSource,
    /// Reference distribution for the asset layer. Derived from the returns when empty.
    #[serde(default)]
    pub asset_distribution: Vec<f64>,
    /// Reference distribution for the strategy layer. Derived from closed trades when empty.
    #[serde(default)]
    pub strategy_distribution: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisTarget {
    Strategy(StrategyInput),
    Portfolio {
        portfolio_id: String,
        strategies: Vec<StrategyInput>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub request_id: String,
    pub target: AnalysisTarget,
}

impl AnalysisRequest {
    pub fn strategy(request_id: impl Into<String>, input: StrategyInput) -> Self {
        Self {
            request_id: request_id.into(),
            target: AnalysisTarget::Strategy(input),
        }
    }

    pub fn portfolio(
        request_id: impl Into<String>,
        portfolio_id: impl Into<String>,
        strategies: Vec<StrategyInput>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            target: AnalysisTarget::Portfolio {
                portfolio_id: portfolio_id.into(),
                strategies,
            },
        }
    }

    /// Strategy ids in request order.
    pub fn strategy_ids(&self) -> Vec<&str> {
        match &self.target {
            AnalysisTarget::Strategy(s) => vec![s.strategy_id.as_str()],
            AnalysisTarget::Portfolio { strategies, .. } => {
                strategies.iter().map(|s| s.strategy_id.as_str()).collect()
            }
        }
    }
}
