//! Safe-fallback policy for degenerate numerics.
//!
//! Every numeric routine in this crate resolves a non-finite or undefined
//! intermediate to one of the constants below instead of returning NaN/Inf or
//! failing. Callers never see a non-finite value.
//!
//! | condition                                   | fallback                  |
//! |---------------------------------------------|---------------------------|
//! | zero variance / fewer than two observations | `SHARPE_FALLBACK` (0.0)   |
//! | empty or non-finite reference distribution  | `PERCENTILE_FALLBACK` (50)|
//! | no usable percentile reading                | `ExitSignalKind::Hold`    |
//! | no losing observations for profit factor    | `PROFIT_FACTOR_CAP`       |
//! | any other non-finite component              | `ZERO_FALLBACK` (0.0)     |

/// Sharpe ratio reported when the standard deviation is zero.
pub const SHARPE_FALLBACK: f64 = 0.0;

/// Percentile rank reported when the reference distribution is unusable.
pub const PERCENTILE_FALLBACK: f64 = 50.0;

/// Profit factor reported when a sample has winners but no losers.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Generic fallback for a non-finite scalar.
pub const ZERO_FALLBACK: f64 = 0.0;

/// Standard deviations below this are treated as zero.
pub const VARIANCE_EPSILON: f64 = 1e-15;

/// Return `value` if finite, otherwise `fallback`.
#[inline]
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
