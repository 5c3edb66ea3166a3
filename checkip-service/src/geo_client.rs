use common::errors::AppError;
use common::http_client::HttpClient;
use common::models::GeoRecord;
use serde::Deserialize;
use std::borrow::Cow;
use std::net::IpAddr;
use tracing::{info, instrument};

const PROVIDER: &str = "geo";

/// ipstack answers failed lookups with HTTP 200 and an error envelope
#[derive(Debug, Deserialize)]
struct GeoApiResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<GeoApiError>,
    #[serde(flatten)]
    record: GeoRecord,
}

#[derive(Debug, Deserialize)]
struct GeoApiError {
    #[serde(default)]
    code: i64,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    info: String,
}

pub struct GeoClient {
    http_client: HttpClient,
    base_url: String,
    access_key: String,
}

impl GeoClient {
    pub fn new(http_client: HttpClient, base_url: String, access_key: String) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key,
        }
    }

    #[instrument(skip(self), fields(ip = %ip))]
    pub async fn resolve(&self, ip: &str) -> Result<GeoRecord, AppError> {
        info!(ip = %ip, "Resolving IP location");

        let url = format!("{}/{}", self.base_url, path_segment(ip));
        let response: GeoApiResponse = self
            .http_client
            .get_json(
                &url,
                &[("access_key", self.access_key.as_str()), ("output", "json")],
            )
            .await?;

        if let Some(error) = response.error {
            return Err(AppError::provider(
                PROVIDER,
                format!("{} ({}): {}", error.kind, error.code, error.info),
            ));
        }
        if response.success == Some(false) {
            return Err(AppError::provider(PROVIDER, "lookup unsuccessful"));
        }

        Ok(response.record)
    }
}

/// Addresses go into the path verbatim; anything else is percent-encoded.
fn path_segment(ip: &str) -> Cow<'_, str> {
    if ip.parse::<IpAddr>().is_ok() {
        Cow::Borrowed(ip)
    } else {
        urlencoding::encode(ip)
    }
}
