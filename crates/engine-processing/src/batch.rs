use crate::{
    error::BatchError,
    handler::{HandlerRegistry, Outcome},
};
use connectors::{
    erp::{ErpClient, Session},
    error::ErpError,
};
use model::{
    execution::{checkpoint::Checkpoint, error_record::ErrorRecord},
    records::erp::ErpPage,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

/// Outcome of one item, tagged with its absolute position in the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub position: u64,
    pub reference: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// Cursor to persist once progress and error records are written.
    pub checkpoint: Checkpoint,
    pub outcomes: Vec<ItemOutcome>,
    pub error_records: Vec<ErrorRecord>,
    pub has_more: bool,
    pub total: Option<u64>,
    pub current_item_label: Option<String>,
}

impl BatchResult {
    pub fn fetched(&self) -> u64 {
        self.outcomes.len() as u64
    }

    pub fn failures(&self) -> u64 {
        self.error_records.len() as u64
    }
}

/// Fetches and classifies exactly one page per call. It never touches
/// persistent state; the orchestrator decides what to commit.
pub struct BatchProcessor {
    client: Arc<dyn ErpClient>,
    handlers: Arc<HandlerRegistry>,
    fetch_timeout: Option<Duration>,
}

impl BatchProcessor {
    pub fn new(client: Arc<dyn ErpClient>, handlers: Arc<HandlerRegistry>) -> Self {
        Self {
            client,
            handlers,
            fetch_timeout: None,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub async fn process(
        &self,
        checkpoint: &Checkpoint,
        session: &Session,
    ) -> Result<BatchResult, BatchError> {
        let entity = checkpoint.entity;
        if checkpoint.batch_size == 0 {
            return Err(BatchError::Invariant(format!(
                "checkpoint for {entity} has a zero batch size"
            )));
        }
        let handler = self.handlers.get(entity).ok_or_else(|| {
            BatchError::Invariant(format!("no sync handler registered for {entity}"))
        })?;

        debug!(
            entity = %entity,
            run_id = %checkpoint.run_id,
            offset = checkpoint.offset,
            batch_size = checkpoint.batch_size,
            "Fetching batch"
        );

        let page = self.fetch(checkpoint, session).await?;
        if page.records.len() > checkpoint.batch_size {
            return Err(ErpError::MalformedResponse(format!(
                "asked for {} {entity}, received {}",
                checkpoint.batch_size,
                page.records.len()
            ))
            .into());
        }

        let mut outcomes = Vec::with_capacity(page.records.len());
        let mut error_records = Vec::new();
        let mut current_item_label = None;

        for (idx, record) in page.records.iter().enumerate() {
            let position = checkpoint.offset + idx as u64;
            let outcome = handler.apply(checkpoint.direction, record).await;

            if let Outcome::Failure(reason) = &outcome {
                debug!(entity = %entity, reference = %record.reference, position, "Item failed: {reason}");
                error_records.push(ErrorRecord::new(
                    checkpoint.run_id.clone(),
                    entity,
                    record.reference.clone(),
                    position,
                    reason.clone(),
                ));
            }

            current_item_label = Some(record.display_label().to_string());
            outcomes.push(ItemOutcome {
                position,
                reference: record.reference.clone(),
                outcome,
            });
        }

        let fetched = outcomes.len() as u64;
        let has_more = outcomes.len() == checkpoint.batch_size;
        let next = checkpoint.advance(fetched, error_records.len() as u64, page.total);

        info!(
            entity = %entity,
            run_id = %checkpoint.run_id,
            batch = next.batch_index,
            fetched,
            failed = error_records.len(),
            offset = next.offset,
            has_more,
            "Batch processed"
        );

        Ok(BatchResult {
            total: next.total,
            checkpoint: next,
            outcomes,
            error_records,
            has_more,
            current_item_label,
        })
    }

    async fn fetch(
        &self,
        checkpoint: &Checkpoint,
        session: &Session,
    ) -> Result<ErpPage, ErpError> {
        let call = self.client.fetch_page(
            checkpoint.entity,
            checkpoint.offset,
            checkpoint.batch_size,
            &checkpoint.filters,
            session,
        );

        match self.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                ErpError::Transport(format!("fetch timed out after {}ms", limit.as_millis()))
            })?,
            None => call.await,
        }
    }
}
