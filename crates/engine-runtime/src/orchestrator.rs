//! Tick-based driver of synchronization runs.
//!
//! Every call to [`SyncOrchestrator::tick`] performs at most one batch and
//! leaves all state needed for the next call in the KV store. Within a tick
//! the commit order is fixed: item side effects, error records, progress,
//! then the checkpoint. A crash between any two steps therefore replays the
//! batch instead of skipping it.

use crate::error::SyncError;
use chrono::Utc;
use connectors::erp::{ErpClient, Session};
use engine_config::SyncConfig;
use engine_core::{
    errors_log::ErrorLog,
    lock::LockManager,
    metrics::{Metrics, MetricsSnapshot},
    progress::ProgressTracker,
    recovery::RecoveryStore,
    state::KvStore,
};
use engine_processing::{batch::BatchProcessor, handler::HandlerRegistry};
use model::{
    core::{
        entity::{Direction, Entity},
        identifiers::RunId,
    },
    execution::{
        checkpoint::Checkpoint,
        error_record::ErrorRecord,
        lock::RunLock,
        run::{Filters, RunStatus, SyncRun, clamp_batch_size},
    },
    progress::snapshot::{ProgressDelta, ProgressSnapshot},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct TickOptions {
    pub direction: Direction,
    /// Only used when a run starts; a resumed run keeps its own filters.
    pub filters: Filters,
    /// Falls back to the configured default. Clamped to the configured max.
    pub batch_size: Option<usize>,
    /// Discards the checkpoint, lock and snapshot and starts a new run.
    pub force_restart: bool,
    pub session: Session,
}

#[derive(Debug)]
pub enum TickResult {
    Running(ProgressSnapshot),
    Completed(ProgressSnapshot),
    Cancelled(ProgressSnapshot),
    /// Another tick holds the lock. Nothing was changed.
    Busy,
    Failed(SyncError),
}

impl TickResult {
    /// Whether the driver should stop polling.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TickResult::Running(_) | TickResult::Busy)
    }

    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        match self {
            TickResult::Running(s) | TickResult::Completed(s) | TickResult::Cancelled(s) => Some(s),
            TickResult::Busy | TickResult::Failed(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TickResult::Running(_) => "running",
            TickResult::Completed(_) => "completed",
            TickResult::Cancelled(_) => "cancelled",
            TickResult::Busy => "busy",
            TickResult::Failed(_) => "failed",
        }
    }
}

/// Everything known about an entity's run, read in one call.
#[derive(Debug, Clone, Serialize)]
pub struct RunOverview {
    pub entity: Entity,
    pub checkpoint: Option<Checkpoint>,
    pub lock: Option<RunLock>,
    pub progress: Option<ProgressSnapshot>,
    /// No progress write within the configured staleness window.
    pub stalled: bool,
}

pub struct SyncOrchestrator {
    locks: LockManager,
    recovery: RecoveryStore,
    progress: ProgressTracker,
    error_log: ErrorLog,
    processor: BatchProcessor,
    config: SyncConfig,
    metrics: Metrics,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn KvStore>,
        client: Arc<dyn ErpClient>,
        handlers: HandlerRegistry,
        config: SyncConfig,
    ) -> Self {
        let processor = BatchProcessor::new(client, Arc::new(handlers))
            .with_fetch_timeout(config.fetch_timeout());

        Self {
            locks: LockManager::new(store.clone()),
            recovery: RecoveryStore::new(store.clone()),
            progress: ProgressTracker::new(
                store.clone(),
                config.progress_ttl(),
                config.throughput_window,
            ),
            error_log: ErrorLog::new(store),
            processor,
            config,
            metrics: Metrics::new(),
        }
    }

    /// Performs at most one batch for `entity`.
    pub async fn tick(&self, entity: Entity, options: TickOptions) -> TickResult {
        self.metrics.increment_ticks();

        let result = match self.try_tick(entity, &options).await {
            Ok(result) => result,
            Err(e) => {
                error!(entity = %entity, kind = e.kind(), "Tick failed before acquiring the lock: {e}");
                TickResult::Failed(e)
            }
        };

        match &result {
            TickResult::Busy => self.metrics.increment_busy(),
            TickResult::Failed(_) => self.metrics.increment_failed_ticks(),
            _ => {}
        }
        result
    }

    async fn try_tick(&self, entity: Entity, options: &TickOptions) -> Result<TickResult, SyncError> {
        if options.force_restart {
            self.reset(entity).await?;
        } else if let Some(snapshot) = self.progress.read(entity).await?
            && snapshot.cancel_requested
        {
            return self.finish_cancelled(entity, snapshot).await;
        }

        let stored = self.recovery.load(entity).await?;
        let run_id = stored
            .as_ref()
            .map(|checkpoint| checkpoint.run_id.clone())
            .unwrap_or_else(RunId::generate);

        if !self
            .locks
            .acquire(entity, &run_id, self.config.lock_ttl())
            .await?
        {
            info!(entity = %entity, run_id = %run_id, "Run is busy");
            return Ok(TickResult::Busy);
        }

        match self.run_batch(entity, &run_id, stored, options).await {
            Ok(result) => Ok(result),
            Err(e) => Ok(self.abort(entity, &run_id, e).await),
        }
    }

    /// Steps that run while holding the lock. Any error here leaves the
    /// checkpoint untouched.
    async fn run_batch(
        &self,
        entity: Entity,
        run_id: &RunId,
        stored: Option<Checkpoint>,
        options: &TickOptions,
    ) -> Result<TickResult, SyncError> {
        let checkpoint = match stored {
            Some(checkpoint) => {
                warn_on_changed_options(&checkpoint, options, self.config.max_batch_size);
                info!(
                    entity = %entity,
                    run_id = %run_id,
                    offset = checkpoint.offset,
                    batch_index = checkpoint.batch_index,
                    "Resuming run"
                );
                checkpoint
            }
            None => {
                let run = SyncRun::new(
                    entity,
                    options.direction,
                    run_id.clone(),
                    options.filters.clone(),
                    options.batch_size.unwrap_or(self.config.default_batch_size),
                    self.config.max_batch_size,
                );
                info!(
                    entity = %entity,
                    run_id = %run_id,
                    direction = %run.direction,
                    batch_size = run.batch_size,
                    "Starting new run"
                );
                // Persisted before the first fetch so a failure still
                // leaves a cursor that pins the run id and options.
                let checkpoint = Checkpoint::fresh(&run);
                self.recovery.save(entity, &checkpoint).await?;
                checkpoint
            }
        };

        let tracked = self.progress.read(entity).await?;
        if tracked.is_none_or(|snapshot| &snapshot.run_id != run_id) {
            self.progress
                .start(entity, run_id, checkpoint.created_at, checkpoint.total)
                .await?;
        }

        let batch = self
            .processor
            .process(&checkpoint, &options.session)
            .await?;

        self.error_log.append(&batch.error_records).await?;

        let status = if batch.has_more {
            RunStatus::Running
        } else {
            RunStatus::Completed
        };
        let snapshot = self
            .progress
            .record(
                entity,
                ProgressDelta {
                    status: Some(status),
                    processed: Some(batch.checkpoint.processed),
                    errors: Some(batch.checkpoint.errors),
                    total: batch.total,
                    current_item_label: batch.current_item_label.clone(),
                    percentage_hint: None,
                },
            )
            .await?;

        self.recovery.save(entity, &batch.checkpoint).await?;

        self.metrics.increment_batches(1);
        self.metrics.increment_records(batch.fetched());
        self.metrics.increment_failures(batch.failures());

        if !batch.has_more {
            self.recovery.clear(entity).await?;
            self.locks.release(entity, run_id).await?;
            info!(
                entity = %entity,
                run_id = %run_id,
                processed = snapshot.processed,
                errors = snapshot.errors,
                elapsed_secs = snapshot.elapsed_secs,
                "Run completed"
            );
            return Ok(TickResult::Completed(snapshot));
        }

        if !self
            .locks
            .renew(entity, run_id, self.config.lock_ttl())
            .await?
        {
            warn!(entity = %entity, run_id = %run_id, "Lock could not be renewed after batch");
        }
        Ok(TickResult::Running(snapshot))
    }

    /// Marks the run failed and frees the lock, keeping the checkpoint so
    /// the next tick resumes from the last committed batch.
    async fn abort(&self, entity: Entity, run_id: &RunId, cause: SyncError) -> TickResult {
        error!(
            entity = %entity,
            run_id = %run_id,
            kind = cause.kind(),
            "Tick failed: {cause}"
        );

        if let Err(e) = self
            .progress
            .record(entity, ProgressDelta::status(RunStatus::Failed))
            .await
        {
            warn!(entity = %entity, run_id = %run_id, "Could not mark progress as failed: {e}");
        }
        if let Err(e) = self.locks.release(entity, run_id).await {
            warn!(entity = %entity, run_id = %run_id, "Could not release lock: {e}");
        }
        TickResult::Failed(cause)
    }

    async fn finish_cancelled(
        &self,
        entity: Entity,
        snapshot: ProgressSnapshot,
    ) -> Result<TickResult, SyncError> {
        let run_id = snapshot.run_id.clone();
        let snapshot = self
            .progress
            .record(entity, ProgressDelta::status(RunStatus::Cancelled))
            .await?;
        // A tick still in flight keeps the lock until it renews.
        if !self.locks.release_idle(entity, &run_id).await? {
            info!(entity = %entity, run_id = %run_id, "Lock left to the tick in flight");
        }

        info!(
            entity = %entity,
            run_id = %run_id,
            processed = snapshot.processed,
            "Run cancelled, checkpoint retained"
        );
        Ok(TickResult::Cancelled(snapshot))
    }

    async fn reset(&self, entity: Entity) -> Result<(), SyncError> {
        if let Some(previous) = self.recovery.load(entity).await? {
            warn!(
                entity = %entity,
                run_id = %previous.run_id,
                offset = previous.offset,
                "Force restart discards checkpoint"
            );
        }
        self.recovery.clear(entity).await?;
        self.locks.force_release(entity).await?;
        self.progress.acknowledge(entity).await?;
        Ok(())
    }

    /// Flags the current run for cancellation. Takes effect at the start of
    /// the next tick. Returns `false` when there is no run.
    pub async fn request_cancel(&self, entity: Entity) -> Result<bool, SyncError> {
        Ok(self.progress.request_cancel(entity).await?)
    }

    pub async fn read_progress(&self, entity: Entity) -> Result<Option<ProgressSnapshot>, SyncError> {
        Ok(self.progress.read(entity).await?)
    }

    /// Drops the progress snapshot, clearing a pending cancellation. A
    /// retained checkpoint is resumed by the next tick.
    pub async fn acknowledge_cancel(&self, entity: Entity) -> Result<(), SyncError> {
        Ok(self.progress.acknowledge(entity).await?)
    }

    pub async fn errors(&self, entity: Entity, run_id: &RunId) -> Result<Vec<ErrorRecord>, SyncError> {
        Ok(self.error_log.list(entity, run_id).await?)
    }

    pub async fn purge_errors(&self, entity: Entity, run_id: &RunId) -> Result<usize, SyncError> {
        let purged = self.error_log.purge(entity, run_id).await?;
        info!(entity = %entity, run_id = %run_id, purged, "Error records purged");
        Ok(purged)
    }

    pub async fn status(&self, entity: Entity) -> Result<RunOverview, SyncError> {
        let progress = self.progress.read(entity).await?;
        let threshold = chrono::Duration::from_std(self.config.stale_after())
            .unwrap_or(chrono::Duration::MAX);
        let stalled = progress
            .as_ref()
            .is_some_and(|snapshot| snapshot.is_stalled(Utc::now(), threshold));

        Ok(RunOverview {
            entity,
            checkpoint: self.recovery.load(entity).await?,
            lock: self.locks.holder(entity).await?,
            progress,
            stalled,
        })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// A resumed run keeps what its checkpoint recorded.
fn warn_on_changed_options(checkpoint: &Checkpoint, options: &TickOptions, max_batch_size: usize) {
    let entity = checkpoint.entity;
    let run_id = &checkpoint.run_id;
    if options.direction != checkpoint.direction {
        warn!(
            entity = %entity,
            run_id = %run_id,
            requested = %options.direction,
            stored = %checkpoint.direction,
            "Ignoring direction of a resumed run"
        );
    }
    if !options.filters.is_empty() && options.filters != checkpoint.filters {
        warn!(
            entity = %entity,
            run_id = %run_id,
            requested = ?options.filters,
            stored = ?checkpoint.filters,
            "Ignoring filters of a resumed run"
        );
    }
    if let Some(requested) = options.batch_size
        && clamp_batch_size(requested, max_batch_size) != checkpoint.batch_size
    {
        warn!(
            entity = %entity,
            run_id = %run_id,
            requested,
            stored = checkpoint.batch_size,
            "Ignoring batch size of a resumed run"
        );
    }
}
