use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::{CounterAspect, RequestTimeAspect};

/// Aspects fed by every request passing through [`monitor_middleware`].
#[derive(Clone)]
pub struct RequestAspects {
    pub counter: Arc<CounterAspect>,
    pub latency: Arc<RequestTimeAspect>,
}

/// Axum middleware that attributes each completed request to the open
/// window: one counter hit for `(path, status)` and one latency sample.
///
/// Also adds a `Server-Timing` response header.
///
/// `path` is the matched route template when the layer is installed with
/// `route_layer`, the raw URI path otherwise.
pub async fn monitor_middleware(
    State(aspects): State<RequestAspects>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();

    let status = response.status().as_u16();
    aspects.latency.record(elapsed);
    aspects.counter.record(&path, status);

    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    tracing::debug!(
        %method,
        path = %path,
        status,
        elapsed_ns = elapsed.as_nanos() as u64,
        "request"
    );

    response
}
