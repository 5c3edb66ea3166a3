use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Structured error types for the lookup service
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Provider error from {provider}: {message}")]
    ProviderError { provider: String, message: String },

    #[error("{0}")]
    TemplateError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::HttpError {
            status,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::TimeoutError(message.into())
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn template(message: impl Into<String>) -> Self {
        Self::TemplateError(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::TimeoutError(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::HttpError { status, .. } => {
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::NetworkError(_) => StatusCode::BAD_GATEWAY,
            AppError::ParseError(_) => StatusCode::BAD_GATEWAY,
            AppError::ProviderError { .. } => StatusCode::BAD_GATEWAY,
            // Rendering failures go back to the caller as raw text.
            AppError::TemplateError(message) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    message,
                )
                    .into_response();
            }
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
