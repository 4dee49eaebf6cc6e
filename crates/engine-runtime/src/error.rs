use connectors::error::ErpError;
use engine_core::error::{ProgressError, RecoveryError, StateStoreError};
use engine_processing::error::BatchError;
use thiserror::Error;

/// Why a tick (or a driver-facing call) failed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Batch-level remote failure. The checkpoint is kept for a resume.
    #[error("ERP error: {0}")]
    Erp(#[from] ErpError),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),
}

impl SyncError {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Erp(_) => "erp",
            SyncError::Invariant(_) => "invariant",
            SyncError::State(_) => "state",
        }
    }
}

impl From<BatchError> for SyncError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Erp(e) => SyncError::Erp(e),
            BatchError::Invariant(reason) => SyncError::Invariant(reason),
        }
    }
}

impl From<RecoveryError> for SyncError {
    fn from(err: RecoveryError) -> Self {
        match err {
            RecoveryError::Store(e) => SyncError::State(e),
            other => SyncError::Invariant(other.to_string()),
        }
    }
}

impl From<ProgressError> for SyncError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::Store(e) => SyncError::State(e),
            ProgressError::Missing(entity) => {
                SyncError::Invariant(format!("progress snapshot for {entity} vanished mid-run"))
            }
        }
    }
}
