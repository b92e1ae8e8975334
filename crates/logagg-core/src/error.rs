//! Crate-level error types for the aggregator lifecycle and storage sinks.

/// Error returned by [`Aggregator`](crate::Aggregator) operations.
///
/// Every variant except [`Closed`](AggregatorError::Closed) reports a
/// lifecycle misuse by the caller.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    /// `submit` was called after `stop` had begun closing the queue.
    #[error("aggregator queue is closed; record rejected")]
    Closed,

    /// `start` was called on an aggregator that is already running.
    #[error("aggregator already started")]
    AlreadyStarted,

    /// `stop` was called before `start`.
    #[error("aggregator was never started")]
    NotStarted,

    /// `start` or `stop` was called after the aggregator was stopped.
    #[error("aggregator already stopped")]
    AlreadyStopped,

    /// The queue capacity must be at least one.
    #[error("queue capacity must be greater than zero")]
    InvalidCapacity,

    /// The worker pool must contain at least one worker.
    #[error("worker count must be greater than zero")]
    InvalidWorkerCount,

    /// A worker task ended abnormally outside a sink call (sink panics are
    /// caught and counted as dropped). Reported after every other worker
    /// has been joined.
    #[error("worker task failed: {0}")]
    WorkerPanicked(String),
}

/// Error returned by a [`LogSink`](crate::LogSink) when a record cannot be stored.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying file or device I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The record could not be encoded for the backing medium.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store did not complete within the configured deadline.
    #[error("store timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The sink refused the record.
    #[error("record rejected: {0}")]
    Rejected(String),
}
