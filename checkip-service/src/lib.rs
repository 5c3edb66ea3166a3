pub mod config;
pub mod geo_client;
pub mod handlers;
pub mod lifecycle;
pub mod listener;
pub mod lookup;
pub mod middleware;
pub mod openapi;
pub mod real_ip;
pub mod routes;
pub mod template;
pub mod timezone_client;

use common::errors::AppError;
use common::http_client::HttpClient;
use std::sync::Arc;

use crate::config::Config;
use crate::geo_client::GeoClient;
use crate::handlers::AppState;
use crate::lifecycle::Lifecycle;
use crate::lookup::LookupService;
use crate::template::IndexTemplate;
use crate::timezone_client::TimezoneClient;

/// Wire the provider clients, template and lifecycle flag from configuration.
pub fn build_state(config: &Config, lifecycle: Lifecycle) -> Result<AppState, AppError> {
    let http_client = HttpClient::new(config.upstream_timeout())?;

    let geo = GeoClient::new(
        http_client.clone(),
        config.geo_api_url.clone(),
        config.geo_access_key.clone(),
    );
    let timezone = TimezoneClient::new(
        http_client,
        config.timezone_api_url.clone(),
        config.timezone_username.clone(),
    );

    let template = match &config.index_template {
        Some(path) => {
            IndexTemplate::load(path).map_err(|e| AppError::internal(e.to_string()))?
        }
        None => IndexTemplate::default(),
    };

    Ok(AppState {
        lookup: Arc::new(LookupService::new(geo, timezone)),
        template: Arc::new(template),
        lifecycle,
    })
}
