use crate::{
    error::SyncError,
    orchestrator::{SyncOrchestrator, TickOptions, TickResult},
};
use async_trait::async_trait;
use connectors::{
    erp::{ErpClient, Session},
    error::ErpError,
};
use engine_config::SyncConfig;
use engine_core::{
    lock::LockManager,
    state::{KvStore, memory::MemoryKvStore},
};
use engine_processing::handler::{HandlerRegistry, Outcome, SyncHandler};
use model::{
    core::{
        entity::{Direction, Entity},
        identifiers::RunId,
    },
    execution::run::{Filters, RunStatus},
    records::erp::{ErpPage, ErpRecord},
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

/// In-memory ERP with an optional one-shot failure at a given offset.
struct ScriptedErp {
    records: Vec<ErpRecord>,
    fail_at: Mutex<Option<(u64, ErpError)>>,
}

impl ScriptedErp {
    fn new(count: usize) -> Self {
        Self {
            records: (0..count)
                .map(|i| ErpRecord::new(format!("P-{i}")).with_label(format!("Product {i}")))
                .collect(),
            fail_at: Mutex::new(None),
        }
    }

    fn fail_once_at(self, offset: u64, err: ErpError) -> Self {
        *self.fail_at.lock().unwrap() = Some((offset, err));
        self
    }
}

#[async_trait]
impl ErpClient for ScriptedErp {
    async fn fetch_page(
        &self,
        _entity: Entity,
        offset: u64,
        batch_size: usize,
        _filters: &Filters,
        _session: &Session,
    ) -> Result<ErpPage, ErpError> {
        {
            let mut fail_at = self.fail_at.lock().unwrap();
            if fail_at.as_ref().is_some_and(|(at, _)| *at == offset) {
                let (_, err) = fail_at.take().unwrap();
                return Err(err);
            }
        }
        let records = self
            .records
            .iter()
            .skip(offset as usize)
            .take(batch_size)
            .cloned()
            .collect();
        Ok(ErpPage::new(records, Some(self.records.len() as u64)))
    }
}

/// Rejects references listed at construction.
struct RejectSome(Vec<&'static str>);

#[async_trait]
impl SyncHandler for RejectSome {
    async fn apply(&self, _: Direction, record: &ErpRecord) -> Outcome {
        if self.0.contains(&record.reference.as_str()) {
            Outcome::Failure("rejected by store".into())
        } else {
            Outcome::Success("stored".into())
        }
    }
}

fn orchestrator(store: Arc<dyn KvStore>, erp: ScriptedErp, rejected: Vec<&'static str>) -> SyncOrchestrator {
    let handlers = HandlerRegistry::new().register(Entity::Products, Arc::new(RejectSome(rejected)));
    SyncOrchestrator::new(store, Arc::new(erp), handlers, SyncConfig::default())
}

fn options(batch_size: usize) -> TickOptions {
    TickOptions {
        batch_size: Some(batch_size),
        ..TickOptions::default()
    }
}

#[tokio::test]
async fn runs_to_completion_and_clears_checkpoint() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let sync = orchestrator(store.clone(), ScriptedErp::new(12), vec!["P-3", "P-11"]);

    let first = sync.tick(Entity::Products, options(5)).await;
    let TickResult::Running(snap) = &first else {
        panic!("expected running, got {}", first.label());
    };
    assert_eq!(snap.processed, 5);
    assert_eq!(snap.errors, 1);
    assert_eq!(snap.current_item_label.as_deref(), Some("Product 4"));

    assert!(matches!(sync.tick(Entity::Products, options(5)).await, TickResult::Running(_)));
    let last = sync.tick(Entity::Products, options(5)).await;
    let TickResult::Completed(snap) = &last else {
        panic!("expected completed, got {}", last.label());
    };
    assert_eq!(snap.processed, 12);
    assert_eq!(snap.errors, 2);
    assert_eq!(snap.percentage, 100.0);

    let overview = sync.status(Entity::Products).await.unwrap();
    assert!(overview.checkpoint.is_none());
    assert!(overview.lock.is_none());

    let errors = sync.errors(Entity::Products, &snap.run_id).await.unwrap();
    let refs: Vec<_> = errors.iter().map(|e| e.item_reference.as_str()).collect();
    assert_eq!(refs, vec!["P-3", "P-11"]);

    let metrics = sync.metrics();
    assert_eq!(metrics.ticks, 3);
    assert_eq!(metrics.batches_processed, 3);
    assert_eq!(metrics.records_processed, 12);
    assert_eq!(metrics.failure_count, 2);
}

#[tokio::test]
async fn in_flight_tick_makes_others_busy() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let sync = orchestrator(store.clone(), ScriptedErp::new(20), vec![]);

    assert!(matches!(sync.tick(Entity::Products, options(5)).await, TickResult::Running(_)));
    let before = sync.status(Entity::Products).await.unwrap();
    let run_id = before.checkpoint.as_ref().unwrap().run_id.clone();

    // Simulate a tick of the same run that is still in flight.
    let locks = LockManager::new(store.clone());
    assert!(locks.acquire(Entity::Products, &run_id, Duration::from_secs(60)).await.unwrap());

    assert!(matches!(sync.tick(Entity::Products, options(5)).await, TickResult::Busy));
    let after = sync.status(Entity::Products).await.unwrap();
    assert_eq!(after.checkpoint, before.checkpoint);
    assert_eq!(sync.metrics().busy_ticks, 1);
}

#[tokio::test]
async fn failed_batch_keeps_checkpoint_and_releases_lock() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let erp = ScriptedErp::new(10).fail_once_at(4, ErpError::AuthExpired);
    let sync = orchestrator(store, erp, vec![]);

    assert!(matches!(sync.tick(Entity::Products, options(4)).await, TickResult::Running(_)));

    let failed = sync.tick(Entity::Products, options(4)).await;
    assert!(matches!(failed, TickResult::Failed(SyncError::Erp(ErpError::AuthExpired))));

    let overview = sync.status(Entity::Products).await.unwrap();
    assert_eq!(overview.checkpoint.as_ref().unwrap().offset, 4);
    assert!(overview.lock.is_none());
    assert_eq!(overview.progress.as_ref().unwrap().status, RunStatus::Failed);

    let resumed = sync.tick(Entity::Products, options(4)).await;
    let TickResult::Running(snap) = &resumed else {
        panic!("expected running, got {}", resumed.label());
    };
    assert_eq!(snap.processed, 8);
    assert_eq!(sync.metrics().failed_ticks, 1);
}

#[tokio::test]
async fn first_batch_failure_keeps_run_id_and_options() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let erp = ScriptedErp::new(12).fail_once_at(0, ErpError::Transport("timed out".into()));
    let sync = orchestrator(store, erp, vec![]);

    let mut first = options(5);
    first.filters = Filters::from([("category".to_string(), "shoes".to_string())]);
    let failed = sync.tick(Entity::Products, first).await;
    assert!(matches!(failed, TickResult::Failed(SyncError::Erp(ErpError::Transport(_)))));

    let overview = sync.status(Entity::Products).await.unwrap();
    let checkpoint = overview.checkpoint.unwrap();
    let progress = overview.progress.unwrap();
    assert_eq!(checkpoint.offset, 0);
    assert_eq!(checkpoint.run_id, progress.run_id);
    assert_eq!(progress.status, RunStatus::Failed);
    assert!(overview.lock.is_none());

    let resumed = sync.tick(Entity::Products, options(20)).await;
    let TickResult::Running(snap) = &resumed else {
        panic!("expected running, got {}", resumed.label());
    };
    assert_eq!(snap.run_id, checkpoint.run_id);
    assert_eq!(snap.processed, 5);

    let checkpoint = sync.status(Entity::Products).await.unwrap().checkpoint.unwrap();
    assert_eq!(checkpoint.batch_size, 5);
    assert_eq!(checkpoint.filters.get("category").map(String::as_str), Some("shoes"));
}

#[tokio::test]
async fn resumed_run_keeps_its_own_batch_size_and_filters() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let sync = orchestrator(store, ScriptedErp::new(30), vec![]);

    let mut first = options(5);
    first.filters = Filters::from([("category".to_string(), "shoes".to_string())]);
    sync.tick(Entity::Products, first).await;

    sync.tick(Entity::Products, options(20)).await;
    let checkpoint = sync.status(Entity::Products).await.unwrap().checkpoint.unwrap();
    assert_eq!(checkpoint.batch_size, 5);
    assert_eq!(checkpoint.offset, 10);
    assert_eq!(checkpoint.filters.get("category").map(String::as_str), Some("shoes"));
}

#[tokio::test]
async fn batch_size_is_clamped_to_configured_maximum() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let sync = orchestrator(store, ScriptedErp::new(1000), vec![]);

    sync.tick(Entity::Products, options(10_000)).await;
    let checkpoint = sync.status(Entity::Products).await.unwrap().checkpoint.unwrap();
    assert_eq!(checkpoint.batch_size, SyncConfig::default().max_batch_size);
}

#[tokio::test]
async fn missing_handler_fails_as_invariant() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let sync = orchestrator(store, ScriptedErp::new(5), vec![]);

    let result = sync.tick(Entity::Orders, options(5)).await;
    assert!(matches!(result, TickResult::Failed(SyncError::Invariant(_))));

    let overview = sync.status(Entity::Orders).await.unwrap();
    assert!(overview.lock.is_none());
    assert_eq!(overview.progress.unwrap().status, RunStatus::Failed);
}

#[tokio::test]
async fn cancel_is_sticky_until_acknowledged() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let sync = orchestrator(store, ScriptedErp::new(30), vec![]);

    assert!(!sync.request_cancel(Entity::Products).await.unwrap());
    sync.tick(Entity::Products, options(10)).await;
    assert!(sync.request_cancel(Entity::Products).await.unwrap());

    for _ in 0..2 {
        let result = sync.tick(Entity::Products, options(10)).await;
        let TickResult::Cancelled(snap) = &result else {
            panic!("expected cancelled, got {}", result.label());
        };
        assert_eq!(snap.processed, 10);
        assert_eq!(snap.percentage, 100.0);
    }

    sync.acknowledge_cancel(Entity::Products).await.unwrap();
    assert!(sync.read_progress(Entity::Products).await.unwrap().is_none());

    // The retained checkpoint is resumed, not restarted.
    let resumed = sync.tick(Entity::Products, options(10)).await;
    let TickResult::Running(snap) = &resumed else {
        panic!("expected running, got {}", resumed.label());
    };
    assert_eq!(snap.processed, 20);
}

#[tokio::test]
async fn force_restart_overrides_cancellation() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let sync = orchestrator(store, ScriptedErp::new(30), vec![]);

    sync.tick(Entity::Products, options(10)).await;
    let old_run = sync.read_progress(Entity::Products).await.unwrap().unwrap().run_id;
    sync.request_cancel(Entity::Products).await.unwrap();

    let restart = TickOptions {
        force_restart: true,
        ..options(10)
    };
    let result = sync.tick(Entity::Products, restart).await;
    let TickResult::Running(snap) = &result else {
        panic!("expected running, got {}", result.label());
    };
    assert_ne!(snap.run_id, old_run);
    assert_eq!(snap.processed, 10);
    assert!(!snap.cancel_requested);
}

#[tokio::test]
async fn purge_errors_removes_run_records() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let sync = orchestrator(store, ScriptedErp::new(3), vec!["P-0", "P-2"]);

    let result = sync.tick(Entity::Products, options(5)).await;
    let run_id = result.snapshot().unwrap().run_id.clone();

    assert_eq!(sync.purge_errors(Entity::Products, &run_id).await.unwrap(), 2);
    assert!(sync.errors(Entity::Products, &run_id).await.unwrap().is_empty());
    assert!(
        sync.errors(Entity::Products, &RunId::new("other"))
            .await
            .unwrap()
            .is_empty()
    );
}
