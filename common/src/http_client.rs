use crate::errors::AppError;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// HTTP client with a per-request timeout.
///
/// Failed requests are not retried; callers decide how to degrade.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AppError::NetworkError)?;

        Ok(Self { client, timeout })
    }

    /// Fetch JSON from `url` with the given query pairs.
    ///
    /// Only `url` is recorded on the span, so credentials passed as query
    /// values never reach the logs.
    #[instrument(skip(self, query), fields(url = %url))]
    pub async fn get_json<T>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, AppError>
    where
        T: serde::de::DeserializeOwned,
    {
        let full_url = with_query(url, query);

        match self.fetch_with_timeout(&full_url).await {
            Ok(response) => {
                info!(url = %url, "Request successful");
                Ok(response)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Request failed");
                Err(e)
            }
        }
    }

    async fn fetch_with_timeout<T>(&self, url: &str) -> Result<T, AppError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| AppError::timeout("Upstream request timed out"))?
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::timeout("Upstream request timed out")
                } else {
                    AppError::NetworkError(e.without_url())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::http(
                status.as_u16(),
                format!("HTTP error: {}", status),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::NetworkError(e.without_url()))?;
        let json: T = serde_json::from_str(&text).map_err(AppError::ParseError)?;

        Ok(json)
    }
}

/// Append percent-encoded query pairs to `url`.
pub fn with_query(url: &str, query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return url.to_string();
    }

    let pairs = query
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, pairs)
}
