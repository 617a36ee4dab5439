//! HTTP dispatch surface shared by both listeners.
//!
//! # Responsibilities
//! - Create the Axum Router with the echo handlers
//! - Wire up middleware (request ID, tracing, timeout, metrics)
//!
//! Both listeners serve clones of the same router; the handlers hold no
//! state, so the only thing a listener adds is the connection itself.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::connect_info::IntoMakeServiceWithConnectInfo,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::any,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::handlers::{echo, header_dump, healthz};
use crate::http::request::request_id;
use crate::http::UuidRequestId;
use crate::observability::metrics;

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(request_timeout: Duration) -> Router {
    Router::new()
        .route("/healthz", any(healthz))
        .route("/headers", any(header_dump))
        .fallback(echo)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = request_id(request).unwrap_or("unknown"),
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::from_fn(record_metrics))
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// Make-service handing the peer address to handlers.
pub fn make_service(router: Router) -> IntoMakeServiceWithConnectInfo<Router, SocketAddr> {
    router.into_make_service_with_connect_info::<SocketAddr>()
}

async fn record_metrics(request: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;
    let status = response.status();
    if status == StatusCode::REQUEST_TIMEOUT {
        tracing::warn!(method = %method, "Request timed out");
    }

    metrics::record_request(&method, status.as_u16(), start_time);
    response
}
