//! Analysis orchestrator: runs every stage for one strategy and fans a
//! portfolio out over a bounded worker pool.
//!
//! Stages within a strategy run sequentially:
//! filter → position shift → horizons → performance/quality → stop-loss → divergence.
//! The only state shared between workers is the horizon cache.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use signallab_core::config::ConfigError;
use signallab_core::divergence::{DivergenceEngine, ExitSignal, SampleTier};
use signallab_core::domain::{closed_trade_returns, PositionSeries, ReturnSeries, SeriesError};
use signallab_core::filter::{FilterAudit, FilterPipeline};
use signallab_core::horizon::{CacheStats, HorizonAnalysis, HorizonAnalyzer, HorizonCache};
use signallab_core::metrics::{trade_returns, PerformanceSnapshot};
use signallab_core::quality::score_quality;
use signallab_core::stop_loss::StopLossSimulator;

use crate::adjustment::{
    calculate_stop_loss_adjusted_metrics, find_optimal_stop_loss, OptimizationMetric, StopLossOptimization,
    StopLossRange,
};
use crate::config::AnalysisConfig;
use crate::request::{AnalysisRequest, AnalysisTarget, StrategyInput};
use crate::result::{AnalysisResult, StrategyAnalysis, StrategyFailure, StrategyOutcome};

/// Errors from analyzing one strategy or scheduling a portfolio.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    Series(#[from] SeriesError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("portfolio has no strategies")]
    EmptyPortfolio,
    #[error("no result within {timeout_ms} ms")]
    TimedOut { timeout_ms: u64 },
    #[error("request targets a portfolio, expected a single strategy")]
    NotAStrategy,
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("worker exited without reporting a result")]
    WorkerLost,
}

/// Per-strategy result list, in input order.
pub type PortfolioResults = Vec<(String, Result<StrategyAnalysis, AnalysisError>)>;

/// Validated, immutable stage set shared by every worker.
struct Stages {
    config: AnalysisConfig,
    pipeline: FilterPipeline,
    horizon: HorizonAnalyzer,
    stop_loss: Option<StopLossSimulator>,
    divergence: DivergenceEngine,
    cache: HorizonCache,
}

/// Filtered, shifted inputs of one strategy.
struct Prepared {
    returns: ReturnSeries,
    positions: PositionSeries,
    audit: FilterAudit,
}

#[derive(Clone)]
pub struct Orchestrator {
    stages: Arc<Stages>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("filters", &self.stages.pipeline.names())
            .field("cache", &self.stages.cache)
            .finish()
    }
}

impl Orchestrator {
    /// Validate `config` and build every stage. Nothing is analyzed with an
    /// invalid configuration.
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let pipeline = FilterPipeline::from_config(&config.filter)?;
        let horizon = HorizonAnalyzer::new(config.horizon.clone())?;
        let stop_loss = config.stop_loss.map(StopLossSimulator::new).transpose()?;
        let divergence = DivergenceEngine::new(config.divergence.clone())?;
        let cache = HorizonCache::new(config.orchestrator.cache_capacity, config.orchestrator.cache_shards)?;
        Ok(Self {
            stages: Arc::new(Stages {
                config,
                pipeline,
                horizon,
                stop_loss,
                divergence,
                cache,
            }),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.stages.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.stages.cache.stats()
    }

    /// Analyze a request. Never fails as a whole: every strategy gets an
    /// outcome, and a portfolio-level error is reported on each of them.
    pub fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let outcomes = match &request.target {
            AnalysisTarget::Strategy(input) => {
                vec![StrategyOutcome::from_result(
                    input.strategy_id.clone(),
                    self.analyze_strategy(input),
                )]
            }
            AnalysisTarget::Portfolio {
                portfolio_id,
                strategies,
            } => match self.analyze_portfolio(strategies) {
                Ok(results) => results
                    .into_iter()
                    .map(|(id, result)| StrategyOutcome::from_result(id, result))
                    .collect(),
                Err(err) if strategies.is_empty() => {
                    vec![StrategyOutcome::from_result(portfolio_id.clone(), Err(err))]
                }
                Err(err) => {
                    tracing::error!(portfolio = %portfolio_id, error = %err, "portfolio analysis failed");
                    let failure = StrategyFailure::from(&err);
                    strategies
                        .iter()
                        .map(|s| StrategyOutcome {
                            strategy_id: s.strategy_id.clone(),
                            analysis: None,
                            failure: Some(failure.clone()),
                        })
                        .collect()
                }
            },
        };

        let result = AnalysisResult {
            request_id: request.request_id.clone(),
            outcomes,
        };
        tracing::info!(
            request = %result.request_id,
            succeeded = result.succeeded(),
            failed = result.failed(),
            "request analyzed"
        );
        result
    }

    /// Run every stage for one strategy.
    pub fn analyze_strategy(&self, input: &StrategyInput) -> Result<StrategyAnalysis, AnalysisError> {
        let _span = tracing::debug_span!("strategy", id = %input.strategy_id).entered();
        let stages = &self.stages;
        let Prepared {
            returns,
            positions,
            audit,
        } = self.prepare(input)?;
        let rets = returns.as_slice();
        let pos = positions.as_slice();

        let HorizonAnalysis {
            metrics: horizon_metrics,
            best_horizon,
        } = stages.horizon.analyze(pos, rets, Some(&stages.cache))?;

        let performance = PerformanceSnapshot::from_returns(&trade_returns(pos, rets));
        let quality = score_quality(&performance, &stages.config.quality);

        let stop_loss = stages
            .stop_loss
            .as_ref()
            .map(|sim| {
                calculate_stop_loss_adjusted_metrics(
                    pos,
                    rets,
                    sim,
                    &stages.horizon,
                    &stages.config.quality,
                    Some(&stages.cache),
                )
            })
            .transpose()?;

        let exit_signal = self.exit_signal(input, &returns, &positions);

        let mut notes = Vec::new();
        let min = stages.horizon.config().min_sample_size;
        for m in horizon_metrics.values().filter(|m| !m.is_eligible()) {
            notes.push(format!(
                "horizon {}: {} samples, below minimum {}",
                m.horizon, m.sample_size, min
            ));
        }
        if best_horizon.is_none() {
            notes.push(format!("no horizon reached {min} samples; best horizon unavailable"));
        }
        if performance.sample_size == 0 {
            notes.push("no positions taken; performance is empty".to_string());
        }
        if exit_signal.observed.is_none() {
            notes.push("no open position; exit signal defaults to HOLD".to_string());
        }
        for (layer, reading) in [("asset", &exit_signal.asset), ("strategy", &exit_signal.strategy)] {
            if reading.tier == SampleTier::Insufficient {
                notes.push(format!(
                    "{layer} reference has {} samples; confidence capped",
                    reading.sample_size
                ));
            }
        }

        Ok(StrategyAnalysis {
            strategy_id: input.strategy_id.clone(),
            filter_audit: audit,
            horizon_metrics,
            best_horizon,
            performance,
            quality,
            stop_loss,
            exit_signal,
            notes,
        })
    }

    /// Scan stop levels for a single-strategy request.
    pub fn optimize_stop_loss(
        &self,
        request: &AnalysisRequest,
        range: &StopLossRange,
        metric: OptimizationMetric,
    ) -> Result<StopLossOptimization, AnalysisError> {
        let AnalysisTarget::Strategy(input) = &request.target else {
            return Err(AnalysisError::NotAStrategy);
        };
        let prepared = self.prepare(input)?;
        find_optimal_stop_loss(
            prepared.positions.as_slice(),
            prepared.returns.as_slice(),
            range,
            metric,
            &self.stages.horizon,
            &self.stages.config.quality,
            Some(&self.stages.cache),
        )
    }

    /// Analyze every strategy on a bounded pool. One strategy's failure never
    /// affects another's result. Output order matches `strategies`.
    pub fn analyze_portfolio(&self, strategies: &[StrategyInput]) -> Result<PortfolioResults, AnalysisError> {
        if strategies.is_empty() {
            return Err(AnalysisError::EmptyPortfolio);
        }

        let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        let workers = strategies
            .len()
            .min(cores)
            .min(self.stages.config.orchestrator.worker_cap);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("signallab-worker-{i}"))
            .panic_handler(|_| tracing::error!("strategy worker panicked"))
            .build()?;
        tracing::debug!(strategies = strategies.len(), workers, "portfolio fan-out");

        let (tx, rx) = mpsc::channel();
        for (index, input) in strategies.iter().enumerate() {
            let tx = tx.clone();
            let worker = self.clone();
            let input = input.clone();
            pool.spawn(move || {
                let result = worker.analyze_strategy(&input);
                // receiver is gone once the deadline has passed
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let timeout_ms = self.stages.config.orchestrator.timeout_ms;
        let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
        let mut slots: Vec<Option<Result<StrategyAnalysis, AnalysisError>>> =
            strategies.iter().map(|_| None).collect();
        let mut pending = strategies.len();

        while pending > 0 {
            let received = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    rx.recv_timeout(remaining).ok()
                }
                None => rx.recv().ok(),
            };
            let Some((index, result)) = received else {
                break;
            };
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(result);
                pending -= 1;
            }
        }

        if pending > 0 {
            tracing::warn!(pending, ?timeout_ms, "strategies did not report in time");
        }

        Ok(strategies
            .iter()
            .zip(slots)
            .map(|(input, slot)| {
                let result = slot.unwrap_or_else(|| {
                    Err(match timeout_ms {
                        Some(timeout_ms) => AnalysisError::TimedOut { timeout_ms },
                        None => AnalysisError::WorkerLost,
                    })
                });
                (input.strategy_id.clone(), result)
            })
            .collect())
    }

    fn prepare(&self, input: &StrategyInput) -> Result<Prepared, AnalysisError> {
        if input.signals.is_empty() {
            return Err(SeriesError::Empty { what: "signals" }.into());
        }
        let returns = input.source.to_returns(input.signals.len())?;
        let (mask, audit) = self.stages.pipeline.apply_mask(&input.signals);
        let positions =
            PositionSeries::from_filtered_signals(&input.signals, Some(&mask), &self.stages.config.sizing);
        Ok(Prepared {
            returns,
            positions,
            audit,
        })
    }

    /// Rank the open position against the asset and strategy references,
    /// deriving either reference from the series itself when not supplied.
    fn exit_signal(&self, input: &StrategyInput, returns: &ReturnSeries, positions: &PositionSeries) -> ExitSignal {
        let rets = returns.as_slice();
        let open = positions.open_position();

        let position_returns: Vec<f64> = open
            .as_ref()
            .and_then(|p| {
                let sign = p.direction.sign();
                rets.get(p.entry_index..=p.exit_index)
                    .map(|slice| slice.iter().map(|r| sign * r).collect())
            })
            .unwrap_or_default();

        let asset_distribution = if input.asset_distribution.is_empty() {
            open.as_ref()
                .map(|p| {
                    let sign = p.direction.sign();
                    returns
                        .rolling_sums(p.holding_len())
                        .into_iter()
                        .map(|s| sign * s)
                        .collect()
                })
                .unwrap_or_default()
        } else {
            input.asset_distribution.clone()
        };

        let strategy_distribution = if input.strategy_distribution.is_empty() {
            closed_trade_returns(positions, rets)
        } else {
            input.strategy_distribution.clone()
        };

        self.stages
            .divergence
            .analyze(&position_returns, &asset_distribution, &strategy_distribution)
    }
}
