//! SignalLab CLI — analyze signal requests and scan stop-loss levels.
//!
//! Commands:
//! - `analyze` — run the full analysis for a strategy or portfolio request
//! - `optimize-stop` — scan a stop-loss range for a single-strategy request
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use signallab_runner::{
    AnalysisConfig, AnalysisRequest, FailureKind, OptimizationMetric, Orchestrator, StopLossRange,
};

#[derive(Parser)]
#[command(
    name = "signallab",
    about = "SignalLab CLI — signal filtering, horizon analysis and exit signals"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a strategy or portfolio request.
    Analyze {
        /// Path to the request JSON.
        #[arg(long)]
        request: PathBuf,

        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the result JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Scan stop-loss levels for a single-strategy request.
    OptimizeStop {
        /// Path to the request JSON (must target a single strategy).
        #[arg(long)]
        request: PathBuf,

        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Tightest stop fraction.
        #[arg(long, default_value_t = 0.01)]
        min: f64,

        /// Loosest stop fraction (inclusive).
        #[arg(long, default_value_t = 0.10)]
        max: f64,

        /// Scan step.
        #[arg(long, default_value_t = 0.01)]
        step: f64,

        /// Metric to maximize: sharpe, win_rate, avg_return, profit_factor, expectancy, quality_score.
        #[arg(long, default_value = "sharpe")]
        metric: OptimizationMetric,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            request,
            config,
            output,
        } => run_analyze(&request, config.as_deref(), output.as_deref()),
        Commands::OptimizeStop {
            request,
            config,
            min,
            max,
            step,
            metric,
        } => run_optimize_stop(&request, config.as_deref(), min, max, step, metric),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn load_request(path: &Path) -> Result<AnalysisRequest> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading request {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing request {}", path.display()))
}

fn run_analyze(request_path: &Path, config_path: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let request = load_request(request_path)?;
    let orchestrator = Orchestrator::new(config).context("invalid configuration")?;

    let result = orchestrator.analyze(&request);
    let json = result.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("writing result {}", path.display()))?;
            println!("Result saved to: {}", path.display());
        }
        None => println!("{json}"),
    }

    let stats = orchestrator.cache_stats();
    tracing::debug!(hits = stats.hits, misses = stats.misses, entries = stats.entries, "horizon cache");

    let mut input_failure = false;
    for outcome in &result.outcomes {
        if let Some(failure) = &outcome.failure {
            eprintln!("Error for {}: {}", outcome.strategy_id, failure.message);
            input_failure |= matches!(failure.kind, FailureKind::Input | FailureKind::Config);
        }
    }
    if input_failure {
        std::process::exit(1);
    }
    Ok(())
}

fn run_optimize_stop(
    request_path: &Path,
    config_path: Option<&Path>,
    min: f64,
    max: f64,
    step: f64,
    metric: OptimizationMetric,
) -> Result<()> {
    let config = load_config(config_path)?;
    let request = load_request(request_path)?;
    if request.strategy_ids().len() != 1 {
        bail!("optimize-stop needs a single-strategy request");
    }
    let range = StopLossRange::new(min, max, step).context("invalid stop-loss range")?;
    let orchestrator = Orchestrator::new(config).context("invalid configuration")?;

    let optimization = orchestrator.optimize_stop_loss(&request, &range, metric)?;

    println!("{:<10} {:>14} {:>9}", "Stop", metric.as_str(), "Triggers");
    println!("{}", "-".repeat(35));
    for level in &optimization.tested {
        let marker = if level.stop_loss_fraction == optimization.best_stop {
            " *"
        } else {
            ""
        };
        println!(
            "{:<10.4} {:>14.6} {:>9}{marker}",
            level.stop_loss_fraction, level.value, level.trigger_count
        );
    }
    println!();
    println!(
        "Best stop: {:.4} ({} = {:.6})",
        optimization.best_stop, metric, optimization.best_value
    );
    Ok(())
}
