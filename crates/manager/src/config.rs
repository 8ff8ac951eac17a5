//! Manager configuration, loadable from TOML.
//!
//! ```toml
//! conflict_max_attempts = 5
//! conflict_backoff_ms = 100
//! workers = 4
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::ManagerError;

/// Default number of update attempts before a conflict is surfaced.
pub const DEFAULT_CONFLICT_MAX_ATTEMPTS: u32 = 5;

/// Default pause between conflicting update attempts.
pub const DEFAULT_CONFLICT_BACKOFF: Duration = Duration::from_millis(100);

/// Default number of queue workers.
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Total update attempts (first write included) when the store reports
    /// a version conflict.
    pub conflict_max_attempts: u32,
    #[serde(rename = "conflict_backoff_ms", deserialize_with = "millis")]
    pub conflict_backoff: Duration,
    pub workers: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            conflict_max_attempts: DEFAULT_CONFLICT_MAX_ATTEMPTS,
            conflict_backoff: DEFAULT_CONFLICT_BACKOFF,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ManagerConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ManagerError> {
        let config: ManagerConfig =
            toml::from_str(source).map_err(|e| ManagerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ManagerError> {
        if self.conflict_max_attempts == 0 {
            return Err(ManagerError::Config(
                "conflict_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ManagerError::Config(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}
