use async_trait::async_trait;
use model::{
    core::entity::{Direction, Entity},
    records::erp::ErpRecord,
};
use std::{collections::HashMap, sync::Arc};

pub mod jsonl;

pub use jsonl::JsonLinesStore;

/// Classification of a single item. Failures become error records and never
/// abort the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }
}

/// Entity-specific side effect for one record.
///
/// Batches are replayed after a crash, so implementations must tolerate
/// seeing the same record twice.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn apply(&self, direction: Direction, record: &ErpRecord) -> Outcome;
}

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<Entity, Arc<dyn SyncHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, entity: Entity, handler: Arc<dyn SyncHandler>) -> Self {
        self.handlers.insert(entity, handler);
        self
    }

    pub fn get(&self, entity: Entity) -> Option<Arc<dyn SyncHandler>> {
        self.handlers.get(&entity).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl SyncHandler for Noop {
        async fn apply(&self, _: Direction, record: &ErpRecord) -> Outcome {
            Outcome::Success(record.reference.clone())
        }
    }

    #[tokio::test]
    async fn registry_resolves_by_entity() {
        let registry = HandlerRegistry::new()
            .register(Entity::Orders, Arc::new(Noop))
            .register(Entity::Products, Arc::new(Noop));

        assert!(registry.get(Entity::Products).is_some());
        assert!(registry.get(Entity::Customers).is_none());

        let handler = registry.get(Entity::Orders).unwrap();
        let outcome = handler
            .apply(Direction::ErpToStore, &ErpRecord::new("O-1"))
            .await;
        assert_eq!(outcome, Outcome::Success("O-1".into()));
    }
}
