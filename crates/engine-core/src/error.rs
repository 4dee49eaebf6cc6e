use model::core::entity::Entity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Failed to encode value for '{key}': {reason}")]
    Encode { key: String, reason: String },

    #[error("Failed to decode value for '{key}': {reason}")]
    Decode { key: String, reason: String },
}

impl From<sled::Error> for StateStoreError {
    fn from(err: sled::Error) -> Self {
        StateStoreError::Backend(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("State store operation failed: {0}")]
    Store(#[from] StateStoreError),

    #[error("Checkpoint for '{expected}' cannot be saved under '{actual}'")]
    EntityMismatch { expected: Entity, actual: Entity },

    #[error("Checkpoint offset for '{entity}' would regress from {stored} to {attempted}")]
    OffsetRegression {
        entity: Entity,
        stored: u64,
        attempted: u64,
    },
}

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("State store operation failed: {0}")]
    Store(#[from] StateStoreError),

    #[error("No progress snapshot for '{0}'")]
    Missing(Entity),
}
