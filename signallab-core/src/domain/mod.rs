//! Domain types: signals, positions, return series.
//!
//! These are plain data. Signals and return series are supplied by the caller
//! and never mutated; positions are derived from signals by an explicit
//! one-step shift (see [`position::shift_to_positions`]).

pub mod position;
pub mod returns;
pub mod signal;

pub use position::{shift_to_positions, Position, PositionSeries, SizingConfig};
pub use returns::{closed_trade_returns, ReturnSeries};
pub use signal::{Direction, Signal};

use thiserror::Error;

/// Malformed input series. The request is rejected and nothing is computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("{what} series is empty")]
    Empty { what: &'static str },
    #[error("length mismatch: {left_name}={left} vs {right_name}={right}")]
    LengthMismatch {
        left_name: &'static str,
        left: usize,
        right_name: &'static str,
        right: usize,
    },
    #[error("{what} series has a non-finite value at index {index}")]
    NonFinite { what: &'static str, index: usize },
    #[error("direction must be -1, 0 or +1, got {0}")]
    InvalidDirection(i64),
    #[error("equity must be > 0, got {value} at index {index}")]
    NonPositiveEquity { index: usize, value: f64 },
}

/// Require two series to have equal length.
pub fn ensure_aligned(
    left_name: &'static str,
    left: usize,
    right_name: &'static str,
    right: usize,
) -> Result<(), SeriesError> {
    if left == right {
        Ok(())
    } else {
        Err(SeriesError::LengthMismatch {
            left_name,
            left,
            right_name,
            right,
        })
    }
}
