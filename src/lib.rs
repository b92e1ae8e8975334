//! logagg: bounded-queue log aggregator.
//!
//! Re-exports the workspace crates and provides [`run`], which wires a
//! store, an aggregator, the simulated producer and the HTTP view together
//! for the binary and for integration tests.
//!
//! # Architecture
//!
//! ```text
//! SimulatedProducer ──submit──► Aggregator ──store──► MemoryStore / JsonlStore ──snapshot──► HTTP view
//! ```
//!
//! Nothing is global: every component is constructed here and handed to the
//! next one through an `Arc`.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use logagg_core::{
    config, Aggregator, AggregatorError, AggregatorOptions, AggregatorStats, FailurePolicy,
    JsonlStore, LogSink, MemoryStore, Record, Snapshot, StoreError, DEFAULT_QUEUE_CAPACITY,
};
pub use logagg_feeds as feeds;
pub use logagg_web as web;

use logagg_core::config::Config;

/// What a finished [`run`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: AggregatorStats,
    /// Records in the store after the final drain.
    pub stored_records: usize,
}

/// Run the whole pipeline on an already-bound listener until `shutdown`
/// resolves.
///
/// Shutdown order: stop accepting HTTP requests, cancel the producer, then
/// drain the aggregator.
pub async fn run<F>(config: Config, listener: TcpListener, shutdown: F) -> anyhow::Result<RunSummary>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (sink, logs) = open_store(&config).await?;
    let aggregator = Arc::new(
        Aggregator::with_options(sink, config.aggregator.options(FailurePolicy::Drop))
            .context("invalid aggregator configuration")?,
    );
    aggregator
        .start(config.aggregator.workers)
        .context("failed to start aggregator workers")?;

    let producer = config.simulator.enabled.then(|| {
        feeds::SimulatedProducer::from_config(&config.simulator)
            .spawn(aggregator.clone(), aggregator.shutdown_token())
    });

    let http_stop = CancellationToken::new();
    let mut server = {
        let state = web::AppState::new(logs.clone()).with_aggregator(aggregator.clone());
        let token = http_stop.clone();
        tokio::spawn(async move { web::serve(listener, state, token.cancelled_owned()).await })
    };

    let exited_early = tokio::select! {
        _ = shutdown => None,
        res = &mut server => Some(res),
    };
    let http_outcome = match exited_early {
        Some(res) => http_view_outcome(res).and_then(|()| {
            Err(anyhow::anyhow!("http view exited before shutdown was requested"))
        }),
        None => {
            tracing::info!("shutdown requested");
            http_stop.cancel();
            http_view_outcome(server.await)
        }
    };
    if let Err(err) = &http_outcome {
        tracing::error!(error = %err, "http view failed; draining before exit");
    }

    aggregator.stop().await.context("failed to drain aggregator")?;
    if let Some(producer) = producer {
        match producer.await {
            Ok(sent) => tracing::info!(sent, "producer finished"),
            Err(err) => tracing::warn!(error = %err, "producer task failed"),
        }
    }
    http_outcome?;

    Ok(RunSummary {
        stats: aggregator.stats(),
        stored_records: logs.len(),
    })
}

/// Flatten the HTTP view task's result.
fn http_view_outcome(
    res: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> anyhow::Result<()> {
    res.context("http view task failed")?
        .context("http view failed")
}

/// The configured sink, and the same object as a read-side handle.
async fn open_store(config: &Config) -> anyhow::Result<(Arc<dyn LogSink>, Arc<dyn Snapshot>)> {
    match &config.storage.jsonl_path {
        Some(path) => {
            let store = Arc::new(
                JsonlStore::open(path)
                    .await
                    .with_context(|| format!("failed to open {}", path.display()))?,
            );
            tracing::info!(path = %path.display(), "storing records in memory and jsonl");
            let sink: Arc<dyn LogSink> = store.clone();
            let logs: Arc<dyn Snapshot> = store;
            Ok((sink, logs))
        }
        None => {
            let store = Arc::new(MemoryStore::new());
            let sink: Arc<dyn LogSink> = store.clone();
            let logs: Arc<dyn Snapshot> = store;
            Ok((sink, logs))
        }
    }
}
