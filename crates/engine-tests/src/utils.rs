use async_trait::async_trait;
use connectors::{
    erp::{ErpClient, Session},
    error::ErpError,
};
use engine_processing::handler::{Outcome, SyncHandler};
use model::{
    core::entity::{Direction, Entity},
    execution::run::Filters,
    records::erp::{ErpPage, ErpRecord},
};
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

/// Scriptable in-memory ERP. Records are `SKU-000`, `SKU-001`, ...
pub struct MockErp {
    records: Vec<ErpRecord>,
    report_total: bool,
    delay: Option<Duration>,
    failures: Mutex<HashMap<u64, ErpError>>,
    calls: Mutex<Vec<u64>>,
}

impl MockErp {
    pub fn with_items(count: usize) -> Self {
        Self {
            records: (0..count)
                .map(|i| {
                    ErpRecord::new(format!("SKU-{i:03}"))
                        .with_label(format!("Product {i}"))
                        .with_payload(serde_json::json!({ "index": i }))
                })
                .collect(),
            report_total: true,
            delay: None,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Pages come back without a total, as some ERP endpoints do.
    pub fn without_total(mut self) -> Self {
        self.report_total = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The next fetch at `offset` fails with `err`; later fetches succeed.
    pub fn fail_once_at(&self, offset: u64, err: ErpError) {
        self.failures.lock().unwrap().insert(offset, err);
    }

    /// Offsets of every fetch, in call order.
    pub fn fetched_offsets(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErpClient for MockErp {
    async fn fetch_page(
        &self,
        _entity: Entity,
        offset: u64,
        batch_size: usize,
        _filters: &Filters,
        _session: &Session,
    ) -> Result<ErpPage, ErpError> {
        self.calls.lock().unwrap().push(offset);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failures.lock().unwrap().remove(&offset) {
            return Err(err);
        }

        let records = self
            .records
            .iter()
            .skip(offset as usize)
            .take(batch_size)
            .cloned()
            .collect();
        let total = self.report_total.then_some(self.records.len() as u64);
        Ok(ErpPage::new(records, total))
    }
}

/// Store-side fake that remembers every reference it was handed.
#[derive(Default)]
pub struct RecordingHandler {
    reject: HashSet<String>,
    seen: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn rejecting(references: &[&str]) -> Self {
        Self {
            reject: references.iter().map(|r| r.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn times_seen(&self, reference: &str) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.as_str() == reference)
            .count()
    }
}

#[async_trait]
impl SyncHandler for RecordingHandler {
    async fn apply(&self, _direction: Direction, record: &ErpRecord) -> Outcome {
        self.seen.lock().unwrap().push(record.reference.clone());
        if self.reject.contains(&record.reference) {
            Outcome::Failure(format!("{} rejected by store", record.reference))
        } else {
            Outcome::Success(format!("{} stored", record.reference))
        }
    }
}
