//! Aggregator: bounded queue plus a fixed pool of storage workers.
//!
//! Producers call [`Aggregator::submit`], which suspends while the queue is
//! full. Each worker pulls one record at a time and hands it to the
//! [`LogSink`]. [`Aggregator::stop`] closes the queue and waits until every
//! accepted record has been processed and every worker has exited.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start(n)──► Running ──stop()──► Stopping ──drained──► Stopped
//! ```
//!
//! Records may be submitted while `Idle`; they wait in the queue until
//! workers are started. Once `stop` begins, `submit` returns
//! [`AggregatorError::Closed`]. Submissions already suspended on a full
//! queue at that moment are accepted and drained.
//!
//! A panicking sink costs one record, not a worker: the panic is caught,
//! the record is counted as dropped, and the worker moves on.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{AggregatorError, StoreError};
use crate::store::LogSink;
use crate::types::Record;

/// Queue capacity used by [`AggregatorOptions::default`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What a worker does with a record its sink failed to store.
#[derive(Clone, Default)]
pub enum FailurePolicy {
    /// Log a warning, count the record as dropped, move on.
    #[default]
    Drop,
    /// Hand the record to a secondary sink. Counted as dropped only if that
    /// sink fails too.
    DeadLetter(Arc<dyn LogSink>),
}

impl fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Drop => write!(f, "Drop"),
            FailurePolicy::DeadLetter(sink) => write!(f, "DeadLetter({})", sink.name()),
        }
    }
}

/// Construction options for [`Aggregator::with_options`].
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub queue_capacity: usize,
    pub failure_policy: FailurePolicy,
    /// Upper bound on a single `store` call. `None` waits indefinitely.
    pub store_timeout: Option<Duration>,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            failure_policy: FailurePolicy::Drop,
            store_timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Point-in-time counters. Every field only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    /// Records accepted into the queue.
    pub submitted: u64,
    /// Records the primary sink stored successfully.
    pub stored: u64,
    /// Records routed to the dead-letter sink.
    pub dead_lettered: u64,
    /// Records lost because every sink failed.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    stored: AtomicU64,
    dead_lettered: AtomicU64,
    dropped: AtomicU64,
    depth: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> AggregatorStats {
        AggregatorStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Everything one worker task needs. Cloned once per spawned worker.
#[derive(Clone)]
struct Worker {
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Record>>>,
    sink: Arc<dyn LogSink>,
    policy: FailurePolicy,
    store_timeout: Option<Duration>,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(self) {
        tracing::debug!("worker started");
        loop {
            // The receiver lock is held only while waiting for the next
            // record, never while storing it.
            let next = {
                let mut queue = self.queue.lock().await;
                queue.recv().await
            };
            let Some(record) = next else { break };
            self.counters.depth.fetch_sub(1, Ordering::Relaxed);
            if let Err(panic) = AssertUnwindSafe(self.process(record)).catch_unwind().await {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    sink = self.sink.name(),
                    panic = panic_message(panic.as_ref()),
                    "sink panicked; record dropped"
                );
            }
        }
        tracing::debug!("worker exiting: queue closed and empty");
    }

    async fn process(&self, record: Record) {
        let fallback = match &self.policy {
            FailurePolicy::DeadLetter(sink) => Some((Arc::clone(sink), record.clone())),
            FailurePolicy::Drop => None,
        };

        let err = match deliver(self.sink.as_ref(), record, self.store_timeout).await {
            Ok(()) => {
                self.counters.stored.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(err) => err,
        };

        let Some((dead_letter, record)) = fallback else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(sink = self.sink.name(), error = %err, "store failed; record dropped");
            return;
        };

        tracing::warn!(
            sink = self.sink.name(),
            dead_letter = dead_letter.name(),
            error = %err,
            "store failed; routing record to dead-letter sink"
        );
        match deliver(dead_letter.as_ref(), record, self.store_timeout).await {
            Ok(()) => {
                self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %err, "dead-letter store failed; record dropped");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

async fn deliver(
    sink: &dyn LogSink,
    record: Record,
    store_timeout: Option<Duration>,
) -> Result<(), StoreError> {
    match store_timeout {
        Some(limit) => tokio::time::timeout(limit, sink.store(record))
            .await
            .unwrap_or(Err(StoreError::Timeout(limit))),
        None => sink.store(record).await,
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

enum Lifecycle {
    Idle,
    Running(Vec<JoinHandle<()>>),
    /// `stop` has begun. The drain is shared so that a `stop` whose future
    /// was dropped can be resumed by the next call.
    Stopping(Arc<tokio::sync::Mutex<Drain>>),
    Stopped,
}

/// Worker handles not yet joined, plus the first abnormal exit seen.
struct Drain {
    handles: Vec<JoinHandle<()>>,
    failure: Option<String>,
}

/// Decouples producers from a storage sink through a bounded queue and a
/// fixed pool of worker tasks.
///
/// Share it between producers with `Arc<Aggregator>`; every operation takes
/// `&self`. Dropping a running aggregator closes the queue and leaves the
/// workers to drain it in the background; call [`stop`](Self::stop) to wait
/// for that instead.
pub struct Aggregator {
    sender: Mutex<Option<mpsc::Sender<Record>>>,
    worker: Worker,
    queue_capacity: usize,
    lifecycle: Mutex<Lifecycle>,
    shutdown: CancellationToken,
}

impl Aggregator {
    /// Bind a sink with the given queue capacity and the default
    /// [`FailurePolicy::Drop`]. Workers are not started.
    pub fn new(sink: Arc<dyn LogSink>, queue_capacity: usize) -> Result<Self, AggregatorError> {
        Self::with_options(
            sink,
            AggregatorOptions {
                queue_capacity,
                ..AggregatorOptions::default()
            },
        )
    }

    pub fn with_options(
        sink: Arc<dyn LogSink>,
        options: AggregatorOptions,
    ) -> Result<Self, AggregatorError> {
        if options.queue_capacity == 0 {
            return Err(AggregatorError::InvalidCapacity);
        }
        let (tx, rx) = mpsc::channel(options.queue_capacity);
        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: Worker {
                queue: Arc::new(tokio::sync::Mutex::new(rx)),
                sink,
                policy: options.failure_policy,
                store_timeout: options.store_timeout,
                counters: Arc::new(Counters::default()),
            },
            queue_capacity: options.queue_capacity,
            lifecycle: Mutex::new(Lifecycle::Idle),
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn `worker_count` worker tasks on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self, worker_count: usize) -> Result<(), AggregatorError> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        match *lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running(_) => return Err(AggregatorError::AlreadyStarted),
            Lifecycle::Stopping(_) | Lifecycle::Stopped => {
                return Err(AggregatorError::AlreadyStopped)
            }
        }
        if worker_count == 0 {
            return Err(AggregatorError::InvalidWorkerCount);
        }

        let handles = (0..worker_count)
            .map(|id| {
                let worker = self.worker.clone();
                tokio::spawn(worker.run().instrument(tracing::info_span!("worker", id)))
            })
            .collect();
        *lifecycle = Lifecycle::Running(handles);

        tracing::info!(
            workers = worker_count,
            queue_capacity = self.queue_capacity,
            sink = self.worker.sink.name(),
            "aggregator started"
        );
        Ok(())
    }

    /// Enqueue a record, suspending while the queue is full.
    ///
    /// Sink failures are never reported here; see [`stats`](Self::stats).
    pub async fn submit(&self, record: Record) -> Result<(), AggregatorError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(AggregatorError::Closed)?;

        let permit = sender.reserve().await.map_err(|_| AggregatorError::Closed)?;
        self.worker.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.worker.counters.depth.fetch_add(1, Ordering::Relaxed);
        permit.send(record);
        Ok(())
    }

    /// Close the queue, drain it, and wait for every worker to exit.
    ///
    /// Cancels the [`shutdown_token`](Self::shutdown_token) first so that
    /// producers stop submitting.
    ///
    /// # Cancel safety
    ///
    /// Cancel safe. If the returned future is dropped before it completes
    /// (for example under `tokio::time::timeout`), the workers keep draining
    /// and the next call to `stop` resumes waiting for them. Only once a
    /// drain has completed does `stop` return
    /// [`AlreadyStopped`](AggregatorError::AlreadyStopped).
    pub async fn stop(&self) -> Result<(), AggregatorError> {
        let drain = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            match &mut *lifecycle {
                Lifecycle::Idle => return Err(AggregatorError::NotStarted),
                Lifecycle::Stopped => return Err(AggregatorError::AlreadyStopped),
                Lifecycle::Stopping(drain) => {
                    tracing::debug!("resuming aggregator drain");
                    Arc::clone(drain)
                }
                Lifecycle::Running(handles) => {
                    let drain = Arc::new(tokio::sync::Mutex::new(Drain {
                        handles: std::mem::take(handles),
                        failure: None,
                    }));
                    *lifecycle = Lifecycle::Stopping(Arc::clone(&drain));
                    self.close();
                    drain
                }
            }
        };

        let mut drain = drain.lock().await;
        // Each handle is popped only after it has been joined, so a dropped
        // future leaves the unjoined ones for the next caller.
        while let Some(handle) = drain.handles.last_mut() {
            let joined = handle.await;
            drain.handles.pop();
            if let Err(err) = joined {
                tracing::error!(error = %err, "worker task failed");
                drain.failure.get_or_insert_with(|| err.to_string());
            }
        }
        let failure = drain.failure.clone();
        drop(drain);

        {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(*lifecycle, Lifecycle::Stopping(_)) {
                *lifecycle = Lifecycle::Stopped;
                let stats = self.stats();
                tracing::info!(
                    submitted = stats.submitted,
                    stored = stats.stored,
                    dead_lettered = stats.dead_lettered,
                    dropped = stats.dropped,
                    "aggregator stopped"
                );
            }
        }

        match failure {
            Some(msg) => Err(AggregatorError::WorkerPanicked(msg)),
            None => Ok(()),
        }
    }

    /// Signal producers and drop our sender. The channel closes once
    /// in-flight submits release their clones; workers exit when it is also
    /// empty.
    fn close(&self) {
        self.shutdown.cancel();
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        tracing::info!(queued = self.queued(), "aggregator stopping; draining queue");
    }

    /// A token cancelled as soon as [`stop`](Self::stop) begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// True once `stop` has begun.
    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner),
            Lifecycle::Running(_)
        )
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Records accepted but not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.worker.counters.depth.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> AggregatorStats {
        self.worker.counters.snapshot()
    }

    /// Records lost because every sink failed.
    pub fn dropped(&self) -> u64 {
        self.worker.counters.dropped.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("queue_capacity", &self.queue_capacity)
            .field("sink", &self.worker.sink.name())
            .field("policy", &self.worker.policy)
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
