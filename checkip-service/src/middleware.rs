//! Request pipeline: correlation ids and access logging.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::real_ip::peer_addr;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id for one request, available as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

static LAST_REQUEST_ID: AtomicI64 = AtomicI64::new(0);

/// Nanosecond wall-clock timestamp, bumped so ids never repeat in-process.
pub fn next_request_id() -> String {
    let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let mut last = LAST_REQUEST_ID.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_REQUEST_ID.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return next.to_string(),
            Err(actual) => last = actual,
        }
    }
}

/// Reuse the caller's `X-Request-Id` or mint one, and echo it on the response.
///
/// A supplied value is echoed byte for byte; the extension carries a lossy
/// string form for logging.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response {
    let supplied = request
        .headers()
        .get(&X_REQUEST_ID)
        .filter(|value| !value.is_empty())
        .cloned();

    let (request_id, echoed) = match supplied {
        Some(value) => (String::from_utf8_lossy(value.as_bytes()).into_owned(), Some(value)),
        None => {
            let id = next_request_id();
            let value = HeaderValue::from_str(&id).ok();
            (id, value)
        }
    };

    request.extensions_mut().insert(RequestId(request_id));

    let mut response = next.run(request).await;
    if let Some(value) = echoed {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

/// Emit one access log line per request, however the request ends.
pub async fn access_log(request: Request<Body>, next: Next) -> Response {
    let mut entry = AccessLog::from_request(&request);
    let response = next.run(request).await;
    entry.status = Some(response.status());
    response
}

/// Access log entry written when dropped, so early returns, cancelled futures
/// and panics still produce exactly one line.
#[derive(Debug)]
pub struct AccessLog {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub remote_addr: String,
    pub user_agent: String,
    pub status: Option<StatusCode>,
    started: Instant,
}

impl AccessLog {
    pub fn from_request(request: &Request<Body>) -> Self {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(RequestId::as_str)
            .unwrap_or("unknown");
        let remote_addr = peer_addr(request.extensions())
            .map(|addr| addr.to_string())
            .unwrap_or_default();
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        Self::new(
            request_id,
            request.method().as_str(),
            request.uri().path(),
            remote_addr,
            user_agent,
        )
    }

    pub fn new(
        request_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        remote_addr: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
            remote_addr: remote_addr.into(),
            user_agent: user_agent.into(),
            status: None,
            started: Instant::now(),
        }
    }
}

impl Drop for AccessLog {
    fn drop(&mut self) {
        let status = self
            .status
            .map(|status| status.as_u16().to_string())
            .unwrap_or_else(|| "-".to_string());

        info!(
            target: "access",
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            remote_addr = %self.remote_addr,
            user_agent = %self.user_agent,
            status = %status,
            latency_ms = self.started.elapsed().as_millis() as u64,
            "request completed"
        );
    }
}
