//! Progress snapshots served to polling consumers.
//!
//! Percentages are derived from `processed / total` whenever the total is
//! known. A caller-supplied estimate is only accepted when no total is
//! available and it moves forward together with `processed`, because batch
//! level estimates are known to stall at a floor value.

use crate::{
    error::ProgressError,
    state::{KvStore, get_typed, keys, set_typed},
};
use chrono::{DateTime, Utc};
use model::{
    core::{entity::Entity, identifiers::RunId},
    execution::run::RunStatus,
    progress::snapshot::{ProgressDelta, ProgressSample, ProgressSnapshot},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

/// Highest percentage a non-finished run may report.
const RUNNING_CEILING: f64 = 99.9;

#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    window: usize,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration, window: usize) -> Self {
        Self {
            store,
            ttl,
            window: window.max(2),
        }
    }

    /// Writes the initial snapshot of a run.
    pub async fn start(
        &self,
        entity: Entity,
        run_id: &RunId,
        started_at: DateTime<Utc>,
        total: Option<u64>,
    ) -> Result<ProgressSnapshot, ProgressError> {
        let mut snapshot = ProgressSnapshot::new(entity, run_id.clone(), total);
        snapshot.started_at = started_at;
        snapshot.elapsed_secs = elapsed_secs(started_at, snapshot.updated_at);
        self.write(&snapshot).await?;
        info!(entity = %entity, run_id = %run_id, "Progress tracking started");
        Ok(snapshot)
    }

    /// Merges `delta` into the stored snapshot and writes it back.
    pub async fn record(
        &self,
        entity: Entity,
        delta: ProgressDelta,
    ) -> Result<ProgressSnapshot, ProgressError> {
        let previous = self
            .read(entity)
            .await?
            .ok_or(ProgressError::Missing(entity))?;

        let snapshot = apply_delta(&previous, &delta, Utc::now(), self.window);
        self.write(&snapshot).await?;

        debug!(
            entity = %entity,
            status = %snapshot.status,
            processed = snapshot.processed,
            errors = snapshot.errors,
            percentage = snapshot.percentage,
            eta_secs = ?snapshot.estimated_remaining_secs,
            "Progress recorded"
        );
        Ok(snapshot)
    }

    pub async fn read(&self, entity: Entity) -> Result<Option<ProgressSnapshot>, ProgressError> {
        Ok(get_typed(self.store.as_ref(), &keys::progress(entity)).await?)
    }

    /// Flags the run for cancellation at the start of its next tick.
    /// Returns `false` when there is no run to cancel or it already completed.
    pub async fn request_cancel(&self, entity: Entity) -> Result<bool, ProgressError> {
        let Some(mut snapshot) = self.read(entity).await? else {
            return Ok(false);
        };
        if snapshot.status == RunStatus::Completed {
            debug!(entity = %entity, run_id = %snapshot.run_id, "Run already completed, nothing to cancel");
            return Ok(false);
        }

        snapshot.cancel_requested = true;
        snapshot.updated_at = Utc::now();
        self.write(&snapshot).await?;
        info!(entity = %entity, run_id = %snapshot.run_id, "Cancellation requested");
        Ok(true)
    }

    /// Drops the snapshot, clearing any cancellation flag with it.
    pub async fn acknowledge(&self, entity: Entity) -> Result<(), ProgressError> {
        self.store.delete(&keys::progress(entity)).await?;
        info!(entity = %entity, "Progress snapshot acknowledged");
        Ok(())
    }

    async fn write(&self, snapshot: &ProgressSnapshot) -> Result<(), ProgressError> {
        set_typed(
            self.store.as_ref(),
            &keys::progress(snapshot.entity),
            snapshot,
            Some(self.ttl),
        )
        .await?;
        Ok(())
    }
}

/// Pure merge of a delta into a snapshot at time `now`.
pub fn apply_delta(
    previous: &ProgressSnapshot,
    delta: &ProgressDelta,
    now: DateTime<Utc>,
    window: usize,
) -> ProgressSnapshot {
    let status = delta.status.unwrap_or(previous.status);
    let processed = delta
        .processed
        .unwrap_or(previous.processed)
        .max(previous.processed);
    let errors = delta.errors.unwrap_or(previous.errors).max(previous.errors);
    let total = delta
        .total
        .or(previous.total)
        .map(|total| total.max(processed));

    let mut history = previous.history.clone();
    history.push(ProgressSample { at: now, processed });
    if history.len() > window {
        history.drain(..history.len() - window);
    }

    let percentage = percentage(previous, status, processed, total, delta.percentage_hint);
    let estimated_remaining_secs = match status {
        RunStatus::Completed => Some(0),
        RunStatus::Running => estimate_remaining(&history, processed, total),
        _ => None,
    };

    ProgressSnapshot {
        entity: previous.entity,
        run_id: previous.run_id.clone(),
        status,
        percentage,
        processed,
        errors,
        total,
        current_item_label: delta
            .current_item_label
            .clone()
            .or_else(|| previous.current_item_label.clone()),
        started_at: previous.started_at,
        updated_at: now,
        elapsed_secs: elapsed_secs(previous.started_at, now),
        estimated_remaining_secs,
        cancel_requested: previous.cancel_requested,
        history,
    }
}

fn percentage(
    previous: &ProgressSnapshot,
    status: RunStatus,
    processed: u64,
    total: Option<u64>,
    hint: Option<f64>,
) -> f64 {
    if status.is_finished() {
        return 100.0;
    }

    let computed = total
        .filter(|total| *total > 0)
        .map(|total| (processed as f64 / total as f64 * 100.0).min(100.0));

    let candidate = match (computed, hint) {
        (Some(computed), _) => computed,
        (None, Some(hint)) if hint_is_plausible(hint, previous, processed) => hint,
        _ => previous.percentage,
    };

    candidate.max(previous.percentage).min(RUNNING_CEILING)
}

/// A hint is rejected when it is out of range, goes backwards, or stays put
/// while `processed` moved.
fn hint_is_plausible(hint: f64, previous: &ProgressSnapshot, processed: u64) -> bool {
    if !hint.is_finite() || !(0.0..=100.0).contains(&hint) {
        return false;
    }
    if hint < previous.percentage {
        return false;
    }
    let advanced = processed > previous.processed;
    !(advanced && hint <= previous.percentage)
}

/// Remaining seconds from the throughput over the retained samples. `None`
/// when there is not enough signal to say anything.
fn estimate_remaining(
    history: &[ProgressSample],
    processed: u64,
    total: Option<u64>,
) -> Option<u64> {
    let total = total?;
    if history.len() < 2 {
        return None;
    }
    let (first, last) = (history.first()?, history.last()?);

    let seconds = (last.at - first.at).num_milliseconds() as f64 / 1000.0;
    let items = last.processed.saturating_sub(first.processed) as f64;
    if seconds <= 0.0 || items <= 0.0 {
        return None;
    }

    let rate = items / seconds;
    let remaining = total.saturating_sub(processed) as f64;
    Some((remaining / rate).ceil() as u64)
}

fn elapsed_secs(started_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - started_at).num_seconds().max(0) as u64
}
