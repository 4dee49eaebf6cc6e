//! Engine settings.
//!
//! Every field has a default, so an absent or partial TOML file is valid.

use crate::error::ConfigError;
use serde::Deserialize;
use std::{path::Path, path::PathBuf, time::Duration};
use tracing::info;

pub mod error;

const DEFAULT_STATE_DIR: &str = ".erpsync/state";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Directory of the sled state store. Defaults to `~/.erpsync/state`.
    pub state_path: Option<PathBuf>,
    pub default_batch_size: usize,
    pub max_batch_size: usize,
    /// Must exceed the longest expected tick.
    pub lock_ttl_secs: u64,
    pub progress_ttl_secs: u64,
    pub stale_after_secs: u64,
    pub fetch_timeout_secs: Option<u64>,
    /// Number of snapshots kept for throughput estimation.
    pub throughput_window: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            state_path: None,
            default_batch_size: 50,
            max_batch_size: 500,
            lock_ttl_secs: 300,
            progress_ttl_secs: 24 * 60 * 60,
            stale_after_secs: 30,
            fetch_timeout_secs: Some(60),
            throughput_window: 10,
        }
    }
}

impl SyncConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;
        info!(path = %path.display(), "Loaded sync config");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid {
                setting: "max_batch_size",
                reason: "must be positive".into(),
            });
        }
        if self.default_batch_size == 0 || self.default_batch_size > self.max_batch_size {
            return Err(ConfigError::Invalid {
                setting: "default_batch_size",
                reason: format!("must be between 1 and {}", self.max_batch_size),
            });
        }
        if self.lock_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                setting: "lock_ttl_secs",
                reason: "must be positive".into(),
            });
        }
        if let Some(timeout) = self.fetch_timeout_secs
            && timeout >= self.lock_ttl_secs
        {
            return Err(ConfigError::Invalid {
                setting: "lock_ttl_secs",
                reason: format!("must exceed fetch_timeout_secs ({timeout})"),
            });
        }
        if self.throughput_window < 2 {
            return Err(ConfigError::Invalid {
                setting: "throughput_window",
                reason: "needs at least two samples".into(),
            });
        }
        Ok(())
    }

    pub fn state_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.state_path {
            Some(path) => Ok(path.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(DEFAULT_STATE_DIR))
                .ok_or(ConfigError::NoHomeDir),
        }
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn progress_ttl(&self) -> Duration {
        Duration::from_secs(self.progress_ttl_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}
