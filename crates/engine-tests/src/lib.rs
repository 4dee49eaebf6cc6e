#![allow(dead_code)]

use engine_config::SyncConfig;
use engine_core::state::KvStore;
use engine_processing::handler::HandlerRegistry;
use engine_runtime::orchestrator::{SyncOrchestrator, TickOptions};
use model::core::entity::Entity;
use std::sync::Arc;
use utils::{MockErp, RecordingHandler};

pub mod utils;

/// Orchestrator for `products` over `store`, wired to the given fakes.
pub fn products_orchestrator(
    store: Arc<dyn KvStore>,
    erp: Arc<MockErp>,
    handler: Arc<RecordingHandler>,
) -> SyncOrchestrator {
    orchestrator_with_config(store, erp, handler, SyncConfig::default())
}

pub fn orchestrator_with_config(
    store: Arc<dyn KvStore>,
    erp: Arc<MockErp>,
    handler: Arc<RecordingHandler>,
    config: SyncConfig,
) -> SyncOrchestrator {
    let handlers = HandlerRegistry::new().register(Entity::Products, handler);
    SyncOrchestrator::new(store, erp, handlers, config)
}

pub fn batch_of(size: usize) -> TickOptions {
    TickOptions {
        batch_size: Some(size),
        ..TickOptions::default()
    }
}
