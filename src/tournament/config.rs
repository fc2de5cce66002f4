//! Tournament configuration.
//!
//! Every field has a default, so `{}` is a valid config file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::rubric::Rubric;
use super::trigger::TriggerConfig;
use super::types::TournamentKind;

pub const MAX_CONCURRENCY_LIMIT: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TournamentConfig {
    pub trigger: TriggerConfig,
    /// Half-width of the tie band around 0.5.
    pub tie_epsilon: f64,
    /// Weight of the forward direction when combining; backward gets the rest.
    pub forward_weight: f64,
    /// Matches judged concurrently within a round.
    pub max_concurrency: usize,
    /// Per directional judge call.
    pub judge_timeout_ms: u64,
    pub retries_per_direction: u32,
    /// Wall-clock budget for the whole tournament.
    pub deadline_ms: Option<u64>,
    /// Replaces the built-in rubric for a kind.
    pub rubrics: HashMap<TournamentKind, Rubric>,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerConfig::default(),
            tie_epsilon: 0.05,
            forward_weight: 0.5,
            max_concurrency: 4,
            judge_timeout_ms: 30_000,
            retries_per_direction: 1,
            deadline_ms: None,
            rubrics: HashMap::new(),
        }
    }
}

impl TournamentConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.trigger;
        if !t.margin_threshold.is_finite() || t.margin_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "trigger.margin_threshold must be finite and >= 0 (got {})",
                t.margin_threshold
            )));
        }
        if !t.high_confidence_ceiling.is_finite() || !(0.0..=1.0).contains(&t.high_confidence_ceiling)
        {
            return Err(ConfigError::Invalid(format!(
                "trigger.high_confidence_ceiling must be in [0,1] (got {})",
                t.high_confidence_ceiling
            )));
        }
        if !self.tie_epsilon.is_finite() || !(0.0..0.5).contains(&self.tie_epsilon) {
            return Err(ConfigError::Invalid(format!(
                "tie_epsilon must be in [0,0.5) (got {})",
                self.tie_epsilon
            )));
        }
        if !self.forward_weight.is_finite() || !(0.0..=1.0).contains(&self.forward_weight) {
            return Err(ConfigError::Invalid(format!(
                "forward_weight must be in [0,1] (got {})",
                self.forward_weight
            )));
        }
        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_concurrency must be in 1..={MAX_CONCURRENCY_LIMIT} (got {})",
                self.max_concurrency
            )));
        }
        if self.judge_timeout_ms == 0 {
            return Err(ConfigError::Invalid("judge_timeout_ms must be > 0".into()));
        }
        if self.deadline_ms == Some(0) {
            return Err(ConfigError::Invalid("deadline_ms must be > 0 when set".into()));
        }
        Ok(())
    }

    /// The rubric for `kind`: the configured override, else the built-in.
    pub fn rubric_for(&self, kind: TournamentKind) -> Rubric {
        self.rubrics
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Rubric::for_kind(kind))
    }

    pub fn judge_timeout(&self) -> Duration {
        Duration::from_millis(self.judge_timeout_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}
