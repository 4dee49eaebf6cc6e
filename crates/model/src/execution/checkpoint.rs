use crate::{
    core::{
        entity::{Direction, Entity},
        identifiers::RunId,
    },
    execution::run::{Filters, SyncRun},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable resume cursor for a run.
///
/// Besides the offset it carries everything needed to rebuild the run on the
/// next tick (run id, filters, batch size) and the cumulative counters, so
/// progress can always be derived from committed state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub entity: Entity,
    pub run_id: RunId,
    pub direction: Direction,
    pub filters: Filters,
    pub batch_size: usize,
    pub offset: u64,
    pub batch_index: u64,
    pub processed: u64,
    pub errors: u64,
    pub total: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Cursor for a run that has not fetched anything yet.
    pub fn fresh(run: &SyncRun) -> Self {
        let now = Utc::now();
        Self {
            entity: run.entity,
            run_id: run.run_id.clone(),
            direction: run.direction,
            filters: run.filters.clone(),
            batch_size: run.batch_size,
            offset: 0,
            batch_index: 0,
            processed: 0,
            errors: 0,
            total: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Cursor after a batch of `fetched` items, `failed` of which produced
    /// error records. The offset moves by everything fetched, failed or not.
    pub fn advance(&self, fetched: u64, failed: u64, total: Option<u64>) -> Self {
        Self {
            offset: self.offset + fetched,
            batch_index: self.batch_index + 1,
            processed: self.processed + fetched,
            errors: self.errors + failed,
            total: total.or(self.total),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> SyncRun {
        SyncRun::new(
            Entity::Products,
            Direction::ErpToStore,
            RunId::new("run-1"),
            Filters::from([("category".to_string(), "shoes".to_string())]),
            10,
            500,
        )
    }

    #[test]
    fn fresh_checkpoint_starts_at_zero() {
        let cp = Checkpoint::fresh(&run());
        assert_eq!(cp.offset, 0);
        assert_eq!(cp.batch_index, 0);
        assert_eq!(cp.batch_size, 10);
        assert_eq!(cp.filters.get("category").map(String::as_str), Some("shoes"));
    }

    #[test]
    fn advance_moves_offset_by_fetched_count() {
        let cp = Checkpoint::fresh(&run()).advance(10, 3, Some(25));
        assert_eq!(cp.offset, 10);
        assert_eq!(cp.batch_index, 1);
        assert_eq!(cp.processed, 10);
        assert_eq!(cp.errors, 3);
        assert_eq!(cp.total, Some(25));

        // An unknown total keeps the last known one.
        let cp = cp.advance(5, 0, None);
        assert_eq!(cp.offset, 15);
        assert_eq!(cp.total, Some(25));
        assert!(cp.updated_at >= cp.created_at);
    }
}
