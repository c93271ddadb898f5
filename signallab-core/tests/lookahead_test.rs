//! Look-ahead contamination tests.
//!
//! Invariant: a position at index t is derived only from signals strictly
//! before t, and a horizon window starting at t uses only returns from t on.
//!
//! Method: compute on a truncated series and on the full series and assert
//! the shared prefix is identical. Any difference means future data leaked
//! into past values.

use chrono::NaiveDate;
use signallab_core::domain::{Direction, PositionSeries, Signal, SizingConfig};
use signallab_core::horizon::horizon_returns;

/// Deterministic direction pattern using a simple LCG.
fn make_signals(n: usize) -> Vec<Signal> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
            let direction = match (seed >> 33) % 3 {
                0 => Direction::Short,
                1 => Direction::Flat,
                _ => Direction::Long,
            };
            Signal::new(base + chrono::Duration::days(i as i64), direction, "lcg")
        })
        .collect()
}

fn make_returns(n: usize) -> Vec<f64> {
    (0..n).map(|i| ((i as f64) * 0.37).sin() * 0.02).collect()
}

#[test]
fn position_prefix_independent_of_future_signals() {
    let full = make_signals(200);
    let sizing = SizingConfig::default();
    let truncated = PositionSeries::from_signals(&full[..100], &sizing);
    let complete = PositionSeries::from_signals(&full, &sizing);
    assert_eq!(truncated.as_slice(), &complete.as_slice()[..100]);
}

#[test]
fn signal_at_t_only_affects_positions_after_t() {
    let mut signals = make_signals(50);
    let sizing = SizingConfig::default();
    let before = PositionSeries::from_signals(&signals, &sizing);

    signals[20].direction = match signals[20].direction {
        Direction::Long => Direction::Short,
        _ => Direction::Long,
    };
    let after = PositionSeries::from_signals(&signals, &sizing);

    assert_eq!(&before.as_slice()[..=20], &after.as_slice()[..=20]);
    assert_ne!(before.as_slice()[21], after.as_slice()[21]);
}

#[test]
fn first_position_is_flat_even_when_first_signal_is_not() {
    let mut signals = make_signals(5);
    signals[0].direction = Direction::Long;
    let ps = PositionSeries::from_signals(&signals, &SizingConfig::default());
    assert_eq!(ps.as_slice()[0], 0.0);
    assert_eq!(ps.as_slice()[1], 1.0);
}

#[test]
fn horizon_windows_ignore_past_returns() {
    let positions = vec![1.0; 60];
    let mut returns = make_returns(60);
    let h = 5;
    let before = horizon_returns(&positions, &returns, h);

    // Rewriting returns[0..10] may only change windows that start before index 10.
    for r in returns.iter_mut().take(10) {
        *r = 0.5;
    }
    let after = horizon_returns(&positions, &returns, h);
    assert_eq!(&before[10..], &after[10..]);
}

#[test]
fn horizon_prefix_stable_when_series_extended() {
    let positions = vec![1.0; 120];
    let returns = make_returns(120);
    let h = 3;
    let short = horizon_returns(&positions[..80], &returns[..80], h);
    let long = horizon_returns(&positions, &returns, h);
    assert_eq!(short.as_slice(), &long[..short.len()]);
}
