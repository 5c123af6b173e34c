//! Sample service for trying rollwatch end to end.
//!
//! Two listeners: the application (`GET /` answers `Hello`) and a
//! separate metrics listener (`GET /metrics`). Every application request
//! is counted, timed, sized, and written to the access log.

pub mod metrics;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::{Body, HttpBody};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tracing::info;

pub use metrics::Metrics;

/// Application routes, instrumented with request metrics and access logging.
pub fn app_router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/", get(hello))
        .layer(middleware::from_fn_with_state(metrics, track))
}

/// Prometheus scrape endpoint.
pub fn metrics_router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .with_state(metrics)
}

async fn hello() -> &'static str {
    "Hello"
}

async fn prometheus_metrics(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render_prometheus(),
    )
}

async fn track(
    State(metrics): State<Arc<Metrics>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let started = Instant::now();
    let response = {
        let _in_flight = metrics.start_request();
        next.run(request).await
    };
    let elapsed = started.elapsed();

    let status = response.status().as_u16();
    let size = response.body().size_hint().exact().unwrap_or(0);
    metrics.record(status, method.as_str(), elapsed, size);

    info!(
        target: "access",
        host = %host,
        method = %method,
        status,
        size,
        duration_ms = elapsed.as_secs_f64() * 1000.0,
        "request"
    );

    response
}
