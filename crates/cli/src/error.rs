use engine_config::error::ConfigError;
use engine_runtime::error::SyncError;
use model::core::entity::Entity;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to open state store at {}: {reason}", path.display())]
    StateStore { path: PathBuf, reason: String },

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("No run recorded for '{0}'")]
    NoRun(Entity),
}
