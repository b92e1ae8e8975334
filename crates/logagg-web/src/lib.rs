//! logagg-web: HTTP view over the store.
//!
//! | Route          | Response                                   |
//! |----------------|--------------------------------------------|
//! | `GET /`        | HTML table of every stored record          |
//! | `GET /api/logs`| JSON array of records                      |
//! | `GET /api/stats`| aggregator counters and queue depth       |
//! | `GET /healthz` | `ok`                                       |
//!
//! Handlers only ever read through [`Snapshot`]; they impose nothing else
//! on the ingestion side.

pub mod render;

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use logagg_core::{Aggregator, AggregatorStats, Record, Snapshot};
use serde::Serialize;
use tokio::net::TcpListener;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    logs: Arc<dyn Snapshot>,
    aggregator: Option<Arc<Aggregator>>,
}

impl AppState {
    pub fn new(logs: Arc<dyn Snapshot>) -> Self {
        Self {
            logs,
            aggregator: None,
        }
    }

    /// Attach an aggregator so `/api/stats` can report its counters.
    pub fn with_aggregator(mut self, aggregator: Arc<Aggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }
}

/// Body of `GET /api/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counters: AggregatorStats,
    pub queued: usize,
    pub queue_capacity: usize,
    /// Records currently visible in the store.
    pub records: usize,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/logs", get(list_logs))
        .route("/api/stats", get(stats))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then finish in-flight requests.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "http view listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn index(State(state): State<AppState>) -> Html<String> {
    let records = state.logs.snapshot();
    tracing::debug!(records = records.len(), "rendering index");
    Html(render::index_page(&records))
}

async fn list_logs(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(state.logs.snapshot())
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let records = state.logs.len();
    let response = match &state.aggregator {
        Some(agg) => StatsResponse {
            counters: agg.stats(),
            queued: agg.queued(),
            queue_capacity: agg.queue_capacity(),
            records,
        },
        None => StatsResponse {
            counters: AggregatorStats::default(),
            queued: 0,
            queue_capacity: 0,
            records,
        },
    };
    Json(response)
}

async fn healthz() -> &'static str {
    "ok"
}
