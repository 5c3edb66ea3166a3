use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse},
};
use common::errors::AppError;
use std::sync::Arc;
use tracing::info;

use crate::lifecycle::Lifecycle;
use crate::lookup::LookupService;
use crate::real_ip::ClientIp;
use crate::template::IndexTemplate;

#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<LookupService>,
    pub template: Arc<IndexTemplate>,
    pub lifecycle: Lifecycle,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Client IP and timezone page", body = String, content_type = "text/html"),
        (status = 500, description = "Index template failed to render", body = String, content_type = "text/plain")
    )
)]
pub async fn index(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<Html<String>, AppError> {
    info!(client_ip = %ip, "Index request received");

    let view = state.lookup.lookup(&ip).await;
    let page = state
        .template
        .render(&view)
        .map_err(|e| AppError::template(e.to_string()))?;

    Ok(Html(page))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 204, description = "Service is accepting traffic"),
        (status = 503, description = "Service is shutting down")
    )
)]
pub async fn health(State(state): State<AppState>) -> StatusCode {
    if state.lifecycle.is_healthy() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found\n")
}

/// Fixed status body served as text so browsers never sniff it as JSON/HTML.
///
/// Not mounted by default; available for routers that want it.
pub async fn force_text() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        "{\"status\":\"ok\"}\n",
    )
}
