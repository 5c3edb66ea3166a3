use axum::{Json, Router, routing::get};
use utoipa::OpenApi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::index,
        handlers::health,
    ),
    tags(
        (name = "checkip", description = "Client IP, location and timezone"),
    ),
)]
pub struct ApiDoc;

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(OPENAPI_PATH, get(|| async { Json(ApiDoc::openapi()) }))
}
