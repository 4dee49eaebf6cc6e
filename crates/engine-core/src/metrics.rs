use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    ticks: AtomicU64,
    busy_ticks: AtomicU64,
    failed_ticks: AtomicU64,
    batches_processed: AtomicU64,
    records_processed: AtomicU64,
    failure_count: AtomicU64,
}

/// In-process counters for the ticks served by this process.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub busy_ticks: u64,
    pub failed_ticks: u64,
    pub batches_processed: u64,
    pub records_processed: u64,
    pub failure_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_ticks(&self) {
        self.inner.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_busy(&self) {
        self.inner.busy_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed_ticks(&self) {
        self.inner.failed_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_batches(&self, count: u64) {
        self.inner
            .batches_processed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_records(&self, count: u64) {
        self.inner
            .records_processed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.inner.ticks.load(Ordering::Relaxed),
            busy_ticks: self.inner.busy_ticks.load(Ordering::Relaxed),
            failed_ticks: self.inner.failed_ticks.load(Ordering::Relaxed),
            batches_processed: self.inner.batches_processed.load(Ordering::Relaxed),
            records_processed: self.inner.records_processed.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
