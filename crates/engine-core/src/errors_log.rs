use crate::{
    error::StateStoreError,
    state::{KvStore, decode, encode, keys},
};
use model::{
    core::{entity::Entity, identifiers::RunId},
    execution::error_record::ErrorRecord,
};
use std::sync::Arc;
use tracing::debug;

/// Append-only store of per-item failures.
///
/// Records are keyed by their absolute position in the run, so replaying a
/// batch after a crash rewrites the same keys instead of duplicating them.
#[derive(Clone)]
pub struct ErrorLog {
    store: Arc<dyn KvStore>,
}

impl ErrorLog {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn append(&self, records: &[ErrorRecord]) -> Result<(), StateStoreError> {
        for record in records {
            let key = keys::error(record.entity, &record.run_id, record.position);
            self.store.set(&key, &encode(&key, record)?, None).await?;
        }
        if !records.is_empty() {
            debug!(count = records.len(), "Error records written");
        }
        Ok(())
    }

    /// All failures of a run, in fetch order.
    pub async fn list(
        &self,
        entity: Entity,
        run_id: &RunId,
    ) -> Result<Vec<ErrorRecord>, StateStoreError> {
        self.store
            .scan_prefix(&keys::errors_prefix(entity, run_id))
            .await?
            .into_iter()
            .map(|(key, bytes)| decode(&key, &bytes))
            .collect()
    }

    /// Removes a run's records. Retention is decided by the caller.
    pub async fn purge(&self, entity: Entity, run_id: &RunId) -> Result<usize, StateStoreError> {
        let entries = self
            .store
            .scan_prefix(&keys::errors_prefix(entity, run_id))
            .await?;
        for (key, _) in &entries {
            self.store.delete(key).await?;
        }
        Ok(entries.len())
    }
}
