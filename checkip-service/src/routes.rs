use axum::{Router, body::Body, extract::Request, http::StatusCode, middleware, routing::get};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, AppState};
use crate::middleware::{RequestId, access_log, request_id};
use crate::openapi::openapi_routes;

/// Time allowed for the client to send a request head, and separately its body.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Time allowed for a handler to produce its response.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router.
///
/// Layers run outer to inner: request id, request span, access log, timeouts.
pub fn app(state: AppState, openapi: bool) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found);

    if openapi {
        router = router.merge(openapi_routes());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(middleware::from_fn(access_log))
                .layer(RequestBodyTimeoutLayer::new(READ_TIMEOUT))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    WRITE_TIMEOUT,
                )),
        )
        .with_state(state)
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(RequestId::as_str)
        .unwrap_or("unknown");

    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}
