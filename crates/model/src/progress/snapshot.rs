use crate::{
    core::{entity::Entity, identifiers::RunId},
    execution::run::RunStatus,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One `(time, processed)` sample kept for throughput estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSample {
    pub at: DateTime<Utc>,
    pub processed: u64,
}

/// Observable state of a run, rebuilt on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub entity: Entity,
    pub run_id: RunId,
    pub status: RunStatus,
    pub percentage: f64,
    pub processed: u64,
    pub errors: u64,
    pub total: Option<u64>,
    pub current_item_label: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub elapsed_secs: u64,
    pub estimated_remaining_secs: Option<u64>,
    pub cancel_requested: bool,
    pub history: Vec<ProgressSample>,
}

impl ProgressSnapshot {
    pub fn new(entity: Entity, run_id: RunId, total: Option<u64>) -> Self {
        let now = Utc::now();
        Self {
            entity,
            run_id,
            status: RunStatus::Running,
            percentage: 0.0,
            processed: 0,
            errors: 0,
            total,
            current_item_label: None,
            started_at: now,
            updated_at: now,
            elapsed_secs: 0,
            estimated_remaining_secs: None,
            cancel_requested: false,
            history: vec![ProgressSample {
                at: now,
                processed: 0,
            }],
        }
    }

    /// A run is stalled when nothing has written its snapshot for longer than
    /// `threshold`, whatever its stored status says.
    pub fn is_stalled(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now - self.updated_at > threshold
    }
}

/// Changes reported by one tick. Counters are absolute values taken from the
/// committed checkpoint, not increments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressDelta {
    pub status: Option<RunStatus>,
    pub processed: Option<u64>,
    pub errors: Option<u64>,
    pub total: Option<u64>,
    pub current_item_label: Option<String>,
    /// Percentage as estimated by the caller. Only used when it is plausible.
    pub percentage_hint: Option<f64>,
}

impl ProgressDelta {
    pub fn status(status: RunStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
