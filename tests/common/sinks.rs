//! Fake storage sinks for driving the aggregator into specific states.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use logagg::{LogSink, MemoryStore, Record, Snapshot, StoreError};
use tokio::sync::Semaphore;

// ---------------------------------------------------------------------------
// GatedSink
// ---------------------------------------------------------------------------

/// Sink whose `store` waits for a permit before delegating to an inner
/// [`MemoryStore`]. Starts closed; call [`open`](Self::open) to let records
/// through.
pub struct GatedSink {
    gate: Semaphore,
    inner: MemoryStore,
    waiting: AtomicUsize,
}

impl GatedSink {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            inner: MemoryStore::new(),
            waiting: AtomicUsize::new(0),
        })
    }

    /// Let `n` more records through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Let every future record through.
    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// Workers currently parked at the gate.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSink for GatedSink {
    async fn store(&self, record: Record) -> Result<(), StoreError> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        permit.forget();
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        self.inner.store(record).await
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

impl Snapshot for GatedSink {
    fn snapshot(&self) -> Vec<Record> {
        self.inner.snapshot()
    }
}

// ---------------------------------------------------------------------------
// FlakySink
// ---------------------------------------------------------------------------

/// Sink that rejects every record whose message is in `reject`, and stores
/// the rest.
pub struct FlakySink {
    reject: Vec<String>,
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl FlakySink {
    pub fn rejecting(reject: impl IntoIterator<Item = String>) -> Arc<Self> {
        Arc::new(Self {
            reject: reject.into_iter().collect(),
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
        })
    }

    /// Total `store` calls, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSink for FlakySink {
    async fn store(&self, record: Record) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.iter().any(|m| m == record.message()) {
            return Err(StoreError::Rejected(format!("{} refused", record.message())));
        }
        self.inner.store(record).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

impl Snapshot for FlakySink {
    fn snapshot(&self) -> Vec<Record> {
        self.inner.snapshot()
    }
}
