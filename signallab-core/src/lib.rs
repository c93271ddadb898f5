//! SignalLab Core — signal filtering, horizon analysis, quality scoring,
//! stop-loss simulation and divergence-based exit signals.
//!
//! This crate contains the analytic components:
//! - Domain types (signals, positions, return series) with the look-ahead shift
//! - Filter pipeline with per-stage rejection accounting
//! - Horizon analyzer with an injectable content-addressed cache
//! - Quality scorer over a performance snapshot
//! - Stop-loss simulator
//! - Dual-layer percentile divergence engine
//!
//! Components never call each other; the runner crate wires them together.

pub mod config;
pub mod divergence;
pub mod domain;
pub mod fallback;
pub mod filter;
pub mod horizon;
pub mod metrics;
pub mod quality;
pub mod rng;
pub mod stats;
pub mod stop_loss;

pub use config::ConfigError;
pub use domain::SeriesError;
