use crate::{
    error::RecoveryError,
    state::{KvStore, get_typed, keys, set_typed},
};
use model::{core::entity::Entity, execution::checkpoint::Checkpoint};
use std::sync::Arc;
use tracing::{debug, info};

/// Persists the resume cursor of each entity's run.
#[derive(Clone)]
pub struct RecoveryStore {
    store: Arc<dyn KvStore>,
}

impl RecoveryStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Stores `checkpoint` for `entity`. Refuses to move the offset of the
    /// same run backwards.
    pub async fn save(&self, entity: Entity, checkpoint: &Checkpoint) -> Result<(), RecoveryError> {
        if checkpoint.entity != entity {
            return Err(RecoveryError::EntityMismatch {
                expected: checkpoint.entity,
                actual: entity,
            });
        }

        if let Some(stored) = self.load(entity).await?
            && stored.run_id == checkpoint.run_id
            && checkpoint.offset < stored.offset
        {
            return Err(RecoveryError::OffsetRegression {
                entity,
                stored: stored.offset,
                attempted: checkpoint.offset,
            });
        }

        set_typed(
            self.store.as_ref(),
            &keys::checkpoint(entity),
            checkpoint,
            None,
        )
        .await?;

        debug!(
            entity = %entity,
            run_id = %checkpoint.run_id,
            offset = checkpoint.offset,
            batch_index = checkpoint.batch_index,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// `Some` means resume, `None` means fresh start.
    pub async fn load(&self, entity: Entity) -> Result<Option<Checkpoint>, RecoveryError> {
        Ok(get_typed(self.store.as_ref(), &keys::checkpoint(entity)).await?)
    }

    pub async fn clear(&self, entity: Entity) -> Result<(), RecoveryError> {
        self.store.delete(&keys::checkpoint(entity)).await?;
        info!(entity = %entity, "Checkpoint cleared");
        Ok(())
    }
}
