#![allow(unused)]
//! Store integration harness.
//!
//! # What this covers
//!
//! - **Concurrent snapshot safety**: snapshots taken while workers are
//!   storing never shrink and never contain a malformed record.
//! - **Substitutable sinks**: the JSON Lines sink behind the aggregator
//!   persists exactly what was submitted.
//!
//! # Running
//!
//! ```sh
//! cargo test --test store_harness
//! ```

mod common;
use common::*;

use std::sync::Arc;

use logagg::{Aggregator, JsonlStore, MemoryStore, Record, Snapshot};
use pretty_assertions::assert_eq;

// ---------------------------------------------------------------------------
// Concurrent snapshots
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshots_during_ingestion_never_shrink() {
    const TOTAL: usize = 5_000;

    let store = Arc::new(MemoryStore::new());
    let agg = Arc::new(Aggregator::new(store.clone(), 64).unwrap());
    agg.start(6).unwrap();

    let reader = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut last = 0usize;
            let mut observations = 0usize;
            while last < TOTAL {
                let snap = store.snapshot();
                assert!(
                    snap.len() >= last,
                    "snapshot shrank from {last} to {}",
                    snap.len()
                );
                for r in &snap {
                    assert!(r.message().starts_with("rec-"), "malformed message {:?}", r.message());
                    assert!(r.source().starts_with("server-"), "malformed source {:?}", r.source());
                }
                last = snap.len();
                observations += 1;
                tokio::task::yield_now().await;
            }
            observations
        })
    };

    for r in tagged_records(TOTAL) {
        agg.submit(r).await.unwrap();
    }
    agg.stop().await.unwrap();

    let observations = reader.await.unwrap();
    assert!(observations > 0);
    assert_eq!(store.len(), TOTAL);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_readers_see_consistent_copies() {
    let store = Arc::new(MemoryStore::new());
    let agg = Arc::new(Aggregator::new(store.clone(), 32).unwrap());
    agg.start(4).unwrap();

    let readers: Vec<_> = (0..5)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let snap = store.snapshot();
                    // No record appears twice in a single copy.
                    assert_no_duplicates!(snap);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for r in tagged_records(1_000) {
        agg.submit(r).await.unwrap();
    }
    agg.stop().await.unwrap();
    for r in futures::future::join_all(readers).await {
        r.unwrap();
    }
    assert_eq!(store.len(), 1_000);
}

// ---------------------------------------------------------------------------
// JSON Lines sink
// ---------------------------------------------------------------------------

#[tokio::test]
async fn jsonl_sink_persists_every_submitted_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingest.jsonl");
    let sink = Arc::new(JsonlStore::open(&path).await.unwrap());
    let agg = Aggregator::new(sink.clone(), 8).unwrap();
    agg.start(3).unwrap();

    let records = tagged_records(40);
    for r in records.clone() {
        agg.submit(r).await.unwrap();
    }
    agg.stop().await.unwrap();

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    let from_disk: Vec<Record> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_same_records!(from_disk, records.clone());
    assert_same_records!(sink.snapshot(), records);
}
