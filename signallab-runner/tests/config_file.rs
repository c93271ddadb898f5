//! Loading analysis configuration from TOML files on disk.

use std::io::Write;

use signallab_core::config::ConfigError;
use signallab_core::filter::FilterSpec;
use signallab_runner::{AnalysisConfig, ConfigLoadError, Orchestrator};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn full_config_file_loads_and_builds_an_orchestrator() {
    let file = write_config(
        r#"
        [[filter.filters]]
        type = "threshold"
        feature = "rsi"
        long_max = 75.0
        short_min = 25.0

        [[filter.filters]]
        type = "volatility_band"
        min_atr = 0.5
        max_atr = 4.0

        [sizing]
        fixed_fraction = 0.5
        max_size = 1.0

        [horizon]
        horizons = [1, 5, 20]
        min_sample_size = 10

        [horizon.weights]
        sharpe_weight = 0.5
        win_rate_weight = 0.5
        sample_size_weight = 0.0

        [stop_loss]
        stop_loss_fraction = 0.04

        [divergence]
        sell = 75.0
        strong_sell = 85.0
        exit_immediately = 95.0
        seed = 7

        [orchestrator]
        worker_cap = 4
        timeout_ms = 5000
        "#,
    );

    let config = AnalysisConfig::load(file.path()).unwrap();
    assert_eq!(config.filter.filters.len(), 2);
    assert!(matches!(
        config.filter.filters[1],
        FilterSpec::VolatilityBand { ref feature, .. } if feature == "atr"
    ));
    assert_eq!(config.horizon.horizons, vec![1, 5, 20]);
    assert_eq!(config.horizon.weights.sample_size_factor, 100.0);
    assert_eq!(config.stop_loss.unwrap().stop_loss_fraction, 0.04);
    assert_eq!(config.divergence.seed, 7);
    assert_eq!(config.divergence.convergence_tolerance, 5.0);
    assert_eq!(config.orchestrator.timeout_ms, Some(5000));
    assert_eq!(config.orchestrator.cache_capacity, 256);

    let orchestrator = Orchestrator::new(config).unwrap();
    assert_eq!(orchestrator.config().orchestrator.worker_cap, 4);
}

#[test]
fn invalid_value_in_file_names_the_parameter() {
    let file = write_config(
        r#"
        [stop_loss]
        stop_loss_fraction = -0.05
        "#,
    );
    let err = AnalysisConfig::load(file.path()).unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::Invalid(ConfigError::InvalidStopLoss(v)) if v == -0.05
    ));
}

#[test]
fn unordered_cut_points_rejected_on_load() {
    let file = write_config(
        r#"
        [divergence]
        sell = 92.0
        strong_sell = 90.0
        "#,
    );
    assert!(matches!(
        AnalysisConfig::load(file.path()),
        Err(ConfigLoadError::Invalid(ConfigError::CutPointsNotOrdered { .. }))
    ));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = AnalysisConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigLoadError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn saved_config_reloads_identically() {
    let mut config = AnalysisConfig::default();
    config.horizon.min_sample_size = 12;
    config.orchestrator.worker_cap = 2;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analysis.toml");
    std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

    assert_eq!(AnalysisConfig::load(&path).unwrap(), config);
}
