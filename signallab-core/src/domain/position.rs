//! Positions derived from signals with an explicit one-bar shift.
//!
//! A signal observed at the close of period `t-1` can only be acted on during
//! period `t`, so `position[t] = signal[t-1]` and `position[0]` is always flat.
//! Every downstream computation consumes the shifted series; none of them ever
//! sees the unshifted signal directions.

use serde::{Deserialize, Serialize};

use super::signal::{Direction, Signal};
use super::SeriesError;
use crate::config::ConfigError;

/// How a directional signal is turned into an exposure size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Size used when no size feature is configured or present.
    pub fixed_fraction: f64,
    /// Optional raw feature whose absolute value sets the size (e.g. "strength").
    pub size_feature: Option<String>,
    /// Upper bound on any position size.
    pub max_size: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            fixed_fraction: 1.0,
            size_feature: None,
            max_size: 1.0,
        }
    }
}

impl SizingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_size.is_finite() || self.max_size <= 0.0 {
            return Err(ConfigError::InvalidPositionSize {
                value: self.max_size,
                max: self.max_size,
            });
        }
        if !self.fixed_fraction.is_finite()
            || self.fixed_fraction <= 0.0
            || self.fixed_fraction > self.max_size
        {
            return Err(ConfigError::InvalidPositionSize {
                value: self.fixed_fraction,
                max: self.max_size,
            });
        }
        if matches!(&self.size_feature, Some(name) if name.is_empty()) {
            return Err(ConfigError::EmptyFeatureName);
        }
        Ok(())
    }

    /// Size for one signal. Flat signals have size 0.
    pub fn size_for(&self, signal: &Signal) -> f64 {
        if signal.direction.is_flat() {
            return 0.0;
        }
        match self.size_feature.as_deref().and_then(|key| signal.feature(key)) {
            Some(v) => v.abs().min(self.max_size),
            None => self.fixed_fraction,
        }
    }
}

/// One-step shift: `out[0] = 0`, `out[t] = exposures[t-1]`.
pub fn shift_to_positions(signal_exposures: &[f64]) -> Vec<f64> {
    if signal_exposures.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(signal_exposures.len());
    out.push(0.0);
    out.extend_from_slice(&signal_exposures[..signal_exposures.len() - 1]);
    out
}

/// A contiguous holding: constant non-zero exposure from `entry_index` to
/// `exit_index` (both inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_index: usize,
    pub exit_index: usize,
    pub direction: Direction,
    pub size: f64,
}

impl Position {
    /// Number of periods held.
    pub fn holding_len(&self) -> usize {
        self.exit_index - self.entry_index + 1
    }
}

/// Per-period signed exposure (`direction * size`) aligned with returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSeries {
    exposures: Vec<f64>,
}

impl PositionSeries {
    /// Build the shifted position series from signals.
    pub fn from_signals(signals: &[Signal], sizing: &SizingConfig) -> Self {
        Self::from_filtered_signals(signals, None, sizing)
    }

    /// Build the shifted series, treating signals with `mask[i] == false` as flat.
    ///
    /// Used after the filter pipeline so index alignment with the return
    /// series survives rejections.
    pub fn from_filtered_signals(
        signals: &[Signal],
        mask: Option<&[bool]>,
        sizing: &SizingConfig,
    ) -> Self {
        let raw: Vec<f64> = signals
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let kept = mask.map_or(true, |m| m.get(i).copied().unwrap_or(false));
                if kept {
                    s.direction.sign() * sizing.size_for(s)
                } else {
                    0.0
                }
            })
            .collect();
        Self {
            exposures: shift_to_positions(&raw),
        }
    }

    /// Wrap an already-shifted exposure series.
    pub fn from_exposures(exposures: Vec<f64>) -> Result<Self, SeriesError> {
        if let Some(index) = exposures.iter().position(|v| !v.is_finite()) {
            return Err(SeriesError::NonFinite {
                what: "positions",
                index,
            });
        }
        Ok(Self { exposures })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.exposures
    }

    pub fn len(&self) -> usize {
        self.exposures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exposures.is_empty()
    }

    /// Contiguous runs of equal non-zero exposure.
    pub fn positions(&self) -> Vec<Position> {
        extract_positions(&self.exposures)
    }

    /// The position still held at the last index, if any.
    pub fn open_position(&self) -> Option<Position> {
        let last = self.exposures.len().checked_sub(1)?;
        self.positions()
            .into_iter()
            .last()
            .filter(|p| p.exit_index == last)
    }
}

/// Split an exposure series into positions. A change in exposure (including a
/// flip from long to short) closes one position and opens the next.
pub fn extract_positions(exposures: &[f64]) -> Vec<Position> {
    let mut out = Vec::new();
    let mut current: Option<Position> = None;

    for (i, &exp) in exposures.iter().enumerate() {
        match current.as_mut() {
            Some(p) if exp != 0.0 && exp == p.direction.sign() * p.size => {
                p.exit_index = i;
            }
            _ => {
                if let Some(done) = current.take() {
                    out.push(done);
                }
                if exp != 0.0 {
                    current = Some(Position {
                        entry_index: i,
                        exit_index: i,
                        direction: Direction::from_exposure(exp),
                        size: exp.abs(),
                    });
                }
            }
        }
    }
    if let Some(done) = current {
        out.push(done);
    }
    out
}
