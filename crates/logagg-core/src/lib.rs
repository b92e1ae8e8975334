//! logagg-core: ingestion engine for logagg.
//!
//! This crate holds the record type, the storage capabilities and their
//! implementations, and the [`Aggregator`] that connects producers to a sink
//! through a bounded queue and a fixed worker pool.
//!
//! # Architecture
//!
//! ```text
//! producers ──submit──► bounded queue ──► N workers ──store──► LogSink
//!                                                                 │
//!                                          readers ◄──snapshot────┘
//! ```
//!
//! Workers run as `tokio` tasks. The queue is the only synchronization
//! point between producers and workers; the store guards its own state.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use aggregator::{
    Aggregator, AggregatorOptions, AggregatorStats, FailurePolicy, DEFAULT_QUEUE_CAPACITY,
};
pub use error::{AggregatorError, StoreError};
pub use store::{JsonlStore, LogSink, MemoryStore, Snapshot};
pub use types::Record;
