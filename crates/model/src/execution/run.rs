use crate::{
    core::{
        entity::{Direction, Entity},
        identifiers::RunId,
    },
    execution::errors::ModelError,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Opaque ERP query filters. Fixed for the lifetime of a run.
pub type Filters = BTreeMap<String, String>;

/// Parses a `key=value` filter argument.
pub fn parse_filter(raw: &str) -> Result<(String, String), ModelError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(ModelError::InvalidFilter(raw.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        }
    }

    /// Completed and cancelled runs report 100%.
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical unit of work for one entity and direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub entity: Entity,
    pub direction: Direction,
    pub run_id: RunId,
    pub status: RunStatus,
    pub filters: Filters,
    pub batch_size: usize,
}

impl SyncRun {
    pub fn new(
        entity: Entity,
        direction: Direction,
        run_id: RunId,
        filters: Filters,
        batch_size: usize,
        max_batch_size: usize,
    ) -> Self {
        Self {
            entity,
            direction,
            run_id,
            status: RunStatus::Running,
            filters,
            batch_size: clamp_batch_size(batch_size, max_batch_size),
        }
    }
}

/// Bounds a requested batch size to `1..=max`.
pub fn clamp_batch_size(requested: usize, max: usize) -> usize {
    requested.clamp(1, max.max(1))
}
