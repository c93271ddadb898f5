//! Small descriptive-statistics helpers shared by the analytic components.
//!
//! All functions are pure and never return NaN/Inf for finite input.

use crate::fallback::{finite_or, SHARPE_FALLBACK, VARIANCE_EPSILON, ZERO_FALLBACK};

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return ZERO_FALLBACK;
    }
    finite_or(values.iter().sum::<f64>() / values.len() as f64, ZERO_FALLBACK)
}

/// Population standard deviation (divides by `n`). Returns 0.0 for fewer than 2 values.
pub fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return ZERO_FALLBACK;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    finite_or(var.sqrt(), ZERO_FALLBACK)
}

/// Mean over population std. Zero std (or < 2 samples) yields `SHARPE_FALLBACK`.
pub fn sharpe(values: &[f64]) -> f64 {
    let std = population_std(values);
    if std < VARIANCE_EPSILON {
        return SHARPE_FALLBACK;
    }
    finite_or(mean(values) / std, SHARPE_FALLBACK)
}

/// Fraction of values strictly greater than zero. 0.0 for an empty slice.
pub fn win_rate(values: &[f64]) -> f64 {
    if values.is_empty() {
        return ZERO_FALLBACK;
    }
    values.iter().filter(|&&v| v > 0.0).count() as f64 / values.len() as f64
}

/// Linear-interpolated quantile of an ascending-sorted slice, `q` in [0, 1].
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => ZERO_FALLBACK,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] * (1.0 - weight) + sorted[upper] * weight
        }
    }
}

/// Sort a copy of the finite values ascending.
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}
