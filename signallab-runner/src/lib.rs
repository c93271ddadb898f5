//! SignalLab Runner — request handling and orchestration.
//!
//! This crate builds on `signallab-core` to provide:
//! - TOML and flat-map configuration with validation
//! - JSON request/result types for single strategies and portfolios
//! - Raw vs. stop-adjusted comparison and stop-level optimization
//! - A bounded worker pool that isolates per-strategy failures

pub mod adjustment;
pub mod config;
pub mod orchestrator;
pub mod request;
pub mod result;

pub use adjustment::{
    calculate_stop_loss_adjusted_metrics, find_optimal_stop_loss, OptimizationMetric, StopLevelScore,
    StopLossOptimization, StopLossRange, UnknownMetric,
};
pub use config::{AnalysisConfig, ConfigLoadError, OrchestratorConfig};
pub use orchestrator::{AnalysisError, Orchestrator, PortfolioResults};
pub use request::{AnalysisRequest, AnalysisTarget, DataSource, StrategyInput};
pub use result::{AnalysisResult, FailureKind, StrategyAnalysis, StrategyFailure, StrategyOutcome};
