use serde::{Deserialize, Serialize};

use super::position::PositionSeries;
use super::SeriesError;

/// Ordered per-period returns, aligned by index with a [`PositionSeries`].
///
/// Read-only after construction; every value is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    values: Vec<f64>,
}

impl ReturnSeries {
    /// Validate and wrap a return series. Empty or non-finite input is rejected.
    pub fn new(values: Vec<f64>) -> Result<Self, SeriesError> {
        if values.is_empty() {
            return Err(SeriesError::Empty { what: "returns" });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(SeriesError::NonFinite {
                what: "returns",
                index,
            });
        }
        Ok(Self { values })
    }

    /// Simple period returns from an equity curve: `e[t] / e[t-1] - 1`.
    ///
    /// Produces `equity.len() - 1` returns. Needs at least two points, all > 0.
    pub fn from_equity_curve(equity: &[f64]) -> Result<Self, SeriesError> {
        if equity.len() < 2 {
            return Err(SeriesError::Empty {
                what: "equity curve",
            });
        }
        if let Some(index) = equity.iter().position(|v| !v.is_finite()) {
            return Err(SeriesError::NonFinite {
                what: "equity curve",
                index,
            });
        }
        if let Some((index, &value)) = equity.iter().enumerate().find(|(_, &v)| v <= 0.0) {
            return Err(SeriesError::NonPositiveEquity { index, value });
        }
        let values = equity.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        Self::new(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sums over every full window of `window` consecutive periods.
    ///
    /// Used as an empirical distribution of `window`-period instrument returns.
    pub fn rolling_sums(&self, window: usize) -> Vec<f64> {
        if window == 0 || window > self.values.len() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(self.values.len() - window + 1);
        let mut acc: f64 = self.values[..window].iter().sum();
        out.push(acc);
        for i in window..self.values.len() {
            acc += self.values[i] - self.values[i - window];
            out.push(acc);
        }
        out
    }
}

/// Summed position-space return of every position that closed before the end
/// of the series. The still-open position, if any, is excluded.
pub fn closed_trade_returns(positions: &PositionSeries, returns: &[f64]) -> Vec<f64> {
    let last = positions.len().saturating_sub(1);
    positions
        .positions()
        .into_iter()
        .filter(|p| p.exit_index < last)
        .map(|p| {
            let sign = p.direction.sign();
            returns
                .get(p.entry_index..=p.exit_index.min(returns.len().saturating_sub(1)))
                .map_or(0.0, |slice| slice.iter().map(|r| sign * r).sum())
        })
        .collect()
}
