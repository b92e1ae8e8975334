//! Simulated producer: emits a fixed record on an interval.
//!
//! Stands in for a real feed when running the binary standalone. The loop
//! stops when its token is cancelled (even while suspended on a full queue),
//! when the aggregator rejects a submission, or after `max_records`.

use std::sync::Arc;
use std::time::Duration;

use logagg_core::config::SimulatorConfig;
use logagg_core::{Aggregator, AggregatorError, Record};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Periodic record generator.
#[derive(Debug, Clone)]
pub struct SimulatedProducer {
    source: String,
    message: String,
    level: String,
    interval: Duration,
    max_records: Option<u64>,
}

impl SimulatedProducer {
    pub fn new(
        source: impl Into<String>,
        message: impl Into<String>,
        level: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            level: level.into(),
            interval,
            max_records: None,
        }
    }

    pub fn from_config(cfg: &SimulatorConfig) -> Self {
        Self::new(&cfg.source, &cfg.message, &cfg.level, cfg.interval())
    }

    /// Stop after emitting `n` records.
    pub fn max_records(mut self, n: u64) -> Self {
        self.max_records = Some(n);
        self
    }

    /// Spawn the producer loop. The handle resolves to the number of records
    /// accepted by the aggregator.
    pub fn spawn(self, aggregator: Arc<Aggregator>, token: CancellationToken) -> JoinHandle<u64> {
        tokio::spawn(async move { self.run(&aggregator, &token).await })
    }

    async fn run(&self, aggregator: &Aggregator, token: &CancellationToken) -> u64 {
        tracing::info!(
            source = %self.source,
            interval_ms = self.interval.as_millis() as u64,
            "simulated producer started"
        );
        // tokio panics on a zero period.
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        let mut sent = 0u64;

        while self.max_records.map_or(true, |max| sent < max) {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let record = Record::now(&self.source, &self.message, &self.level);
            let outcome = tokio::select! {
                _ = token.cancelled() => break,
                outcome = aggregator.submit(record) => outcome,
            };
            match outcome {
                Ok(()) => sent += 1,
                Err(AggregatorError::Closed) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "simulated producer submit failed");
                    break;
                }
            }
        }

        tracing::info!(source = %self.source, sent, "simulated producer stopped");
        sent
    }
}
