//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Optimizer options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Fold constant sub-expressions.
    pub constant_folding: bool,
    /// Merge stacked filters and drop always-true filters.
    pub simplify_filters: bool,
    /// Maximum rewrite passes before giving up on a fixpoint.
    pub max_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            constant_folding: true,
            simplify_filters: true,
            max_iterations: 10,
        }
    }
}

/// Execution options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Most tuples a sort may hold in memory.
    pub sort_buffer_limit: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            sort_buffer_limit: 1_000_000,
        }
    }
}

/// Engine configuration options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub optimizer: OptimizerConfig,
    pub execution: ExecutionConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.optimizer.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "optimizer.max_iterations must be at least 1".into(),
            ));
        }
        if self.execution.sort_buffer_limit == 0 {
            return Err(ConfigError::Invalid(
                "execution.sort_buffer_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Set constant_folding flag.
    pub fn constant_folding(mut self, value: bool) -> Self {
        self.optimizer.constant_folding = value;
        self
    }

    /// Set simplify_filters flag.
    pub fn simplify_filters(mut self, value: bool) -> Self {
        self.optimizer.simplify_filters = value;
        self
    }

    pub fn max_iterations(mut self, value: usize) -> Self {
        self.optimizer.max_iterations = value;
        self
    }

    pub fn sort_buffer_limit(mut self, value: usize) -> Self {
        self.execution.sort_buffer_limit = value;
        self
    }
}
