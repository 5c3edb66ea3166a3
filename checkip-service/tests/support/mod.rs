#![allow(dead_code)]

use checkip_service::geo_client::GeoClient;
use checkip_service::handlers::AppState;
use checkip_service::lifecycle::Lifecycle;
use checkip_service::lookup::LookupService;
use checkip_service::template::IndexTemplate;
use checkip_service::timezone_client::TimezoneClient;
use common::http_client::HttpClient;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

pub const ACCESS_KEY: &str = "test-access-key";
pub const USERNAME: &str = "demo-user";
pub const GEO_PATH: &str = "/geo";
pub const TIMEZONE_PATH: &str = "/timezoneJSON";

pub fn http_client() -> HttpClient {
    HttpClient::new(Duration::from_secs(2)).expect("Failed to build HTTP client")
}

pub fn geo_client(server: &MockServer) -> GeoClient {
    GeoClient::new(
        http_client(),
        format!("{}{}", server.uri(), GEO_PATH),
        ACCESS_KEY.to_string(),
    )
}

pub fn timezone_client(server: &MockServer) -> TimezoneClient {
    TimezoneClient::new(
        http_client(),
        format!("{}{}", server.uri(), TIMEZONE_PATH),
        USERNAME.to_string(),
    )
}

pub fn lookup_service(server: &MockServer) -> LookupService {
    LookupService::new(geo_client(server), timezone_client(server))
}

pub fn app_state(server: &MockServer, lifecycle: Lifecycle) -> AppState {
    AppState {
        lookup: Arc::new(lookup_service(server)),
        template: Arc::new(IndexTemplate::default()),
        lifecycle,
    }
}

pub fn geo_body(ip: &str, latitude: f64, longitude: f64) -> Value {
    json!({
        "ip": ip,
        "type": "ipv4",
        "continent_code": "NA",
        "continent_name": "North America",
        "country_code": "US",
        "country_name": "United States",
        "region_code": "ME",
        "region_name": "Maine",
        "city": "Rockland",
        "zip": "04841",
        "latitude": latitude,
        "longitude": longitude,
        "metro_code": 500,
        "area_code": 207
    })
}

pub fn timezone_body(timezone_id: &str, latitude: f64, longitude: f64) -> Value {
    json!({
        "sunrise": "2024-06-01 05:01",
        "lng": longitude,
        "countryCode": "US",
        "gmtOffset": -5,
        "rawOffset": -5,
        "sunset": "2024-06-01 20:10",
        "timezoneId": timezone_id,
        "dstOffset": -4,
        "countryName": "United States",
        "time": "2024-06-01 12:00",
        "lat": latitude
    })
}

/// Geo provider answering for `ip` with the given coordinates.
pub async fn mount_geo(server: &MockServer, ip: &str, latitude: f64, longitude: f64) {
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", GEO_PATH, ip)))
        .and(query_param("access_key", ACCESS_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(geo_body(ip, latitude, longitude)))
        .mount(server)
        .await;
}

/// Timezone provider answering only for the exact formatted coordinates.
pub async fn mount_timezone(server: &MockServer, lat: &str, lng: &str, timezone_id: &str) {
    Mock::given(method("GET"))
        .and(path(TIMEZONE_PATH))
        .and(query_param("lat", lat))
        .and(query_param("lng", lng))
        .and(query_param("username", USERNAME))
        .respond_with(ResponseTemplate::new(200).set_body_json(timezone_body(
            timezone_id,
            lat.parse().unwrap_or_default(),
            lng.parse().unwrap_or_default(),
        )))
        .mount(server)
        .await;
}
