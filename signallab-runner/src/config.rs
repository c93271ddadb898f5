//! Serializable analysis configuration.
//!
//! One struct per component, aggregated into [`AnalysisConfig`]. Every field
//! has a documented default, so a partial TOML file or an empty parameter map
//! is always a usable configuration. Validation runs once, before any request
//! is analyzed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use signallab_core::config::ConfigError;
use signallab_core::divergence::DivergenceConfig;
use signallab_core::domain::SizingConfig;
use signallab_core::filter::FilterConfig;
use signallab_core::horizon::HorizonConfig;
use signallab_core::quality::QualityWeights;
use signallab_core::stop_loss::StopLossConfig;

/// Failure to obtain a configuration from a file or string.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

/// Worker pool and cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on portfolio worker threads.
    pub worker_cap: usize,
    /// Portfolio-level deadline. Strategies not done by then are reported as timed out.
    pub timeout_ms: Option<u64>,
    pub cache_capacity: usize,
    pub cache_shards: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_cap: 16,
            timeout_ms: None,
            cache_capacity: 256,
            cache_shards: 16,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_cap == 0 {
            return Err(ConfigError::ZeroWorkerCap);
        }
        if self.cache_capacity == 0 || self.cache_shards == 0 {
            return Err(ConfigError::InvalidCacheSize);
        }
        Ok(())
    }
}

/// Complete configuration for analyzing one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub filter: FilterConfig,
    pub sizing: SizingConfig,
    pub horizon: HorizonConfig,
    pub quality: QualityWeights,
    /// Stop-loss evaluation is skipped entirely when absent.
    pub stop_loss: Option<StopLossConfig>,
    pub divergence: DivergenceConfig,
    pub orchestrator: OrchestratorConfig,
}

impl AnalysisConfig {
    /// Run every component's validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter.validate()?;
        self.sizing.validate()?;
        self.horizon.validate()?;
        self.quality.validate()?;
        if let Some(stop) = &self.stop_loss {
            stop.validate()?;
        }
        self.divergence.validate()?;
        self.orchestrator.validate()
    }

    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigLoadError> {
        Ok(toml::from_str(content)?)
    }

    /// Load, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Build a config from a flat map of dotted keys, e.g.
    /// `"horizon.min_sample_size" = 10` or `"stop_loss.stop_loss_fraction" = 0.05`.
    ///
    /// Unknown keys are ignored. A key whose value has the wrong type is
    /// skipped with a warning and the default is kept. The result is not
    /// validated.
    pub fn from_flat_params(params: &BTreeMap<String, serde_json::Value>) -> Self {
        let defaults = Self::default();
        let Ok(mut tree) = serde_json::to_value(&defaults) else {
            return defaults;
        };

        for (key, value) in params {
            let mut candidate = tree.clone();
            match set_dotted(&mut candidate, key, value.clone()) {
                SetOutcome::UnknownKey => {
                    tracing::debug!(key = %key, "ignoring unknown config key");
                    continue;
                }
                SetOutcome::Set => {}
            }
            match serde_json::from_value::<Self>(candidate.clone()) {
                Ok(_) => tree = candidate,
                Err(e) => tracing::warn!(key = %key, error = %e, "config value has wrong type, keeping default"),
            }
        }

        serde_json::from_value(tree).unwrap_or(defaults)
    }
}

enum SetOutcome {
    Set,
    UnknownKey,
}

/// Write `value` at a dotted path. Intermediate `null` (an absent optional
/// section) is materialized as an object; any other missing segment means the
/// key is unknown.
fn set_dotted(tree: &mut serde_json::Value, key: &str, value: serde_json::Value) -> SetOutcome {
    let segments: Vec<&str> = key.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return SetOutcome::UnknownKey;
    };

    let mut node = tree;
    let mut created = false;
    for segment in parents {
        if node.is_null() {
            *node = serde_json::Value::Object(serde_json::Map::new());
            created = true;
        }
        let Some(object) = node.as_object_mut() else {
            return SetOutcome::UnknownKey;
        };
        if !object.contains_key(*segment) {
            if !created {
                return SetOutcome::UnknownKey;
            }
            object.insert((*segment).to_string(), serde_json::Value::Null);
        }
        match object.get_mut(*segment) {
            Some(next) => node = next,
            None => return SetOutcome::UnknownKey,
        }
    }

    if node.is_null() {
        *node = serde_json::Value::Object(serde_json::Map::new());
        created = true;
    }
    let Some(object) = node.as_object_mut() else {
        return SetOutcome::UnknownKey;
    };
    if !object.contains_key(*last) && !created {
        return SetOutcome::UnknownKey;
    }
    object.insert((*last).to_string(), value);
    SetOutcome::Set
}
