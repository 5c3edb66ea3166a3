use common::errors::AppError;
use common::http_client::HttpClient;
use common::models::TimezoneRecord;
use serde::Deserialize;
use tracing::{info, instrument};

const PROVIDER: &str = "timezone";

/// GeoNames reports failures inside a `status` object
#[derive(Debug, Deserialize)]
struct TimezoneApiResponse {
    #[serde(default)]
    status: Option<TimezoneApiStatus>,
    #[serde(flatten)]
    record: TimezoneRecord,
}

#[derive(Debug, Deserialize)]
struct TimezoneApiStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    value: i64,
}

pub struct TimezoneClient {
    http_client: HttpClient,
    base_url: String,
    username: String,
}

impl TimezoneClient {
    pub fn new(http_client: HttpClient, base_url: String, username: String) -> Self {
        Self {
            http_client,
            base_url,
            username,
        }
    }

    /// Timezone identifier (e.g. `Europe/London`) for a coordinate pair.
    pub async fn resolve(&self, latitude: f64, longitude: f64) -> Result<String, AppError> {
        self.lookup(latitude, longitude)
            .await
            .map(|record| record.timezone_id)
    }

    #[instrument(skip(self))]
    pub async fn lookup(&self, latitude: f64, longitude: f64) -> Result<TimezoneRecord, AppError> {
        info!(latitude, longitude, "Resolving timezone");

        let lat = format_coordinate(latitude);
        let lng = format_coordinate(longitude);
        let response: TimezoneApiResponse = self
            .http_client
            .get_json(
                &self.base_url,
                &[
                    ("lat", lat.as_str()),
                    ("lng", lng.as_str()),
                    ("username", self.username.as_str()),
                ],
            )
            .await?;

        if let Some(status) = response.status {
            return Err(AppError::provider(
                PROVIDER,
                format!("{} ({})", status.message, status.value),
            ));
        }

        Ok(response.record)
    }
}

fn format_coordinate(value: f64) -> String {
    format!("{:.6}", value)
}
