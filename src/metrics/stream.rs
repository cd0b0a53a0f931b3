use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::registry::MetricRegistry;
use crate::handlers::AppError;

/// State behind the monitor endpoint.
pub struct MonitorState {
    pub registry: Arc<MetricRegistry>,
    /// Push cadence of the SSE stream.
    pub stream_interval: Duration,
}

// ─── GET / ───────────────────────────────────────────────────────
/// The whole exposition document.

pub async fn get_document(State(state): State<Arc<MonitorState>>) -> Json<Value> {
    Json(state.registry.document())
}

// ─── GET /:name ──────────────────────────────────────────────────
/// A single aspect's published snapshot.

pub async fn get_aspect(
    State(state): State<Arc<MonitorState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    state
        .registry
        .get(&name)
        .map(|aspect| Json(aspect.stats()))
        .ok_or_else(|| AppError::NotFound(format!("no aspect named {name:?}")))
}

// ─── GET /stream ─────────────────────────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes the full document as JSON every `stream_interval`. Snapshots
/// only change on flush, so most events repeat the previous one.

pub async fn document_stream(
    State(state): State<Arc<MonitorState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(state.stream_interval);

    let stream = IntervalStream::new(interval).map(move |_| {
        let json = serde_json::to_string(&state.registry.document()).unwrap_or_default();
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
