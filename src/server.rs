use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, AppState};
use crate::metrics::stream::{self, MonitorState};
use crate::middleware::{monitor_middleware, RequestAspects};

/// Builds the instrumented application router.
///
/// The monitor middleware is a route layer, so counts are keyed by route
/// template and unmatched requests are not recorded.
pub fn create_app_router(state: Arc<AppState>, aspects: RequestAspects) -> Router {
    Router::new()
        .route("/", get(handlers::hello))
        .route("/samples/:series", post(handlers::push_sample))
        .with_state(state)
        // ── Per-request accounting ──────────────────────────────
        .route_layer(axum_mw::from_fn_with_state(aspects, monitor_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Builds the monitor endpoint router serving published snapshots.
pub fn create_monitor_router(state: Arc<MonitorState>) -> Router {
    Router::new()
        .route("/", get(stream::get_document))
        .route("/stream", get(stream::document_stream))
        .route("/:name", get(stream::get_aspect))
        .with_state(state)
        .layer(CorsLayer::permissive())
}
