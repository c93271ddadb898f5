//! Performance snapshot — pure summary statistics over a return sample.
//!
//! The sample is whatever the caller considers one observation per trade or
//! per position-period. Every field is finite; degenerate inputs resolve to the
//! constants in [`crate::fallback`].

use serde::{Deserialize, Serialize};

use crate::domain::position::extract_positions;
use crate::fallback::{finite_or, PROFIT_FACTOR_CAP, ZERO_FALLBACK};
use crate::stats;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub sample_size: usize,
    pub win_rate: f64,
    pub avg_return: f64,
    pub avg_win: f64,
    /// Mean of the losing observations (≤ 0), or 0 when there are none.
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub sharpe: f64,
    pub total_return: f64,
}

impl PerformanceSnapshot {
    /// Summarize a sample. Non-finite observations are ignored.
    pub fn from_returns(sample: &[f64]) -> Self {
        let values: Vec<f64> = sample.iter().copied().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return Self::default();
        }
        let wins: Vec<f64> = values.iter().copied().filter(|&v| v > 0.0).collect();
        let losses: Vec<f64> = values.iter().copied().filter(|&v| v < 0.0).collect();

        let win_rate = stats::win_rate(&values);
        let avg_win = stats::mean(&wins);
        let avg_loss = stats::mean(&losses);

        Self {
            sample_size: values.len(),
            win_rate,
            avg_return: stats::mean(&values),
            avg_win,
            avg_loss,
            profit_factor: profit_factor(&wins, &losses),
            expectancy: finite_or(win_rate * avg_win + (1.0 - win_rate) * avg_loss, ZERO_FALLBACK),
            sharpe: stats::sharpe(&values),
            total_return: finite_or(values.iter().sum(), ZERO_FALLBACK),
        }
    }

    /// Field-wise `self - baseline`. `sample_size` is carried from `self`.
    pub fn delta(&self, baseline: &Self) -> Self {
        Self {
            sample_size: self.sample_size,
            win_rate: self.win_rate - baseline.win_rate,
            avg_return: self.avg_return - baseline.avg_return,
            avg_win: self.avg_win - baseline.avg_win,
            avg_loss: self.avg_loss - baseline.avg_loss,
            profit_factor: self.profit_factor - baseline.profit_factor,
            expectancy: self.expectancy - baseline.expectancy,
            sharpe: self.sharpe - baseline.sharpe,
            total_return: self.total_return - baseline.total_return,
        }
    }
}

/// Gross wins / |gross losses|. Capped at `PROFIT_FACTOR_CAP` when there are no losses.
fn profit_factor(wins: &[f64], losses: &[f64]) -> f64 {
    let gross_win: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().sum::<f64>().abs();
    if gross_loss == 0.0 {
        return if gross_win > 0.0 {
            PROFIT_FACTOR_CAP
        } else {
            ZERO_FALLBACK
        };
    }
    finite_or(gross_win / gross_loss, ZERO_FALLBACK).min(PROFIT_FACTOR_CAP)
}

/// Summed position-space return of every position, including one still open
/// at the end of the series.
pub fn trade_returns(positions: &[f64], returns: &[f64]) -> Vec<f64> {
    extract_positions(positions)
        .into_iter()
        .map(|p| {
            let sign = p.direction.sign();
            returns
                .get(p.entry_index..=p.exit_index)
                .map_or(ZERO_FALLBACK, |slice| slice.iter().map(|r| sign * r).sum())
        })
        .collect()
}
