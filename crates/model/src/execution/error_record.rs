use crate::core::{entity::Entity, identifiers::RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single item that failed during a run. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub run_id: RunId,
    pub entity: Entity,
    pub item_reference: String,
    /// Absolute position of the item within the run's fetch order.
    pub position: u64,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(
        run_id: RunId,
        entity: Entity,
        item_reference: impl Into<String>,
        position: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            entity,
            item_reference: item_reference.into(),
            position,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}
