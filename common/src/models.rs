use serde::{Deserialize, Deserializer, Serialize};

/// Geolocation of an IP address as reported by the geo provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoRecord {
    #[serde(deserialize_with = "nullable")]
    pub ip: String,
    #[serde(rename = "type", deserialize_with = "nullable")]
    pub kind: String,
    #[serde(deserialize_with = "nullable")]
    pub continent_code: String,
    #[serde(deserialize_with = "nullable")]
    pub continent_name: String,
    #[serde(deserialize_with = "nullable")]
    pub country_code: String,
    #[serde(deserialize_with = "nullable")]
    pub country_name: String,
    #[serde(deserialize_with = "nullable")]
    pub region_code: String,
    #[serde(deserialize_with = "nullable")]
    pub region_name: String,
    #[serde(deserialize_with = "nullable")]
    pub city: String,
    #[serde(rename = "zip", alias = "zipcode", deserialize_with = "nullable")]
    pub postal_code: String,
    #[serde(deserialize_with = "nullable")]
    pub latitude: f64,
    #[serde(deserialize_with = "nullable")]
    pub longitude: f64,
    #[serde(deserialize_with = "nullable")]
    pub metro_code: i64,
    #[serde(deserialize_with = "nullable")]
    pub area_code: i64,
}

/// Timezone metadata for a coordinate pair as reported by the timezone provider.
///
/// Offsets are hours; the provider reports fractional values for zones such as
/// `Asia/Kolkata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimezoneRecord {
    #[serde(deserialize_with = "nullable")]
    pub sunrise: String,
    #[serde(deserialize_with = "nullable")]
    pub sunset: String,
    #[serde(rename = "lng", deserialize_with = "nullable")]
    pub longitude: f64,
    #[serde(rename = "lat", deserialize_with = "nullable")]
    pub latitude: f64,
    #[serde(deserialize_with = "nullable")]
    pub country_code: String,
    #[serde(deserialize_with = "nullable")]
    pub country_name: String,
    #[serde(deserialize_with = "nullable")]
    pub gmt_offset: f64,
    #[serde(deserialize_with = "nullable")]
    pub raw_offset: f64,
    #[serde(deserialize_with = "nullable")]
    pub dst_offset: f64,
    #[serde(deserialize_with = "nullable")]
    pub timezone_id: String,
    #[serde(rename = "time", deserialize_with = "nullable")]
    pub local_time: String,
}

/// Values available to the index page for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderView {
    pub ip: String,
    pub country: String,
    pub city: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone_id: String,
}

impl RenderView {
    pub fn new(ip: impl Into<String>, geo: &GeoRecord, timezone_id: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            country: geo.country_name.clone(),
            city: geo.city.clone(),
            region: geo.region_name.clone(),
            latitude: geo.latitude,
            longitude: geo.longitude,
            timezone_id: timezone_id.into(),
        }
    }
}

// Providers send `null` for fields they cannot resolve.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn google_dns() -> serde_json::Value {
        json!({
            "ip": "8.8.8.8",
            "type": "ipv4",
            "continent_code": "NA",
            "continent_name": "North America",
            "country_code": "US",
            "country_name": "United States",
            "region_code": "OH",
            "region_name": "Ohio",
            "city": "Glenmont",
            "zip": "44628",
            "latitude": 40.5369,
            "longitude": -82.1286,
            "metro_code": 510,
            "area_code": 330
        })
    }

    #[test]
    fn geo_record_survives_serialization() {
        let parsed: GeoRecord = serde_json::from_value(google_dns()).unwrap();
        let reserialized = serde_json::to_value(&parsed).unwrap();

        assert_eq!(reserialized, google_dns());
        assert_eq!(parsed.kind, "ipv4");
        assert_eq!(parsed.postal_code, "44628");
        assert_eq!(parsed.metro_code, 510);
    }

    #[test]
    fn geo_record_accepts_zipcode_alias() {
        let parsed: GeoRecord =
            serde_json::from_value(json!({ "ip": "1.1.1.1", "zipcode": "90001" })).unwrap();
        assert_eq!(parsed.postal_code, "90001");
    }

    #[test]
    fn null_and_missing_fields_default() {
        let parsed: GeoRecord = serde_json::from_value(json!({
            "ip": "10.0.0.1",
            "city": null,
            "latitude": null,
            "metro_code": null
        }))
        .unwrap();

        assert_eq!(parsed.ip, "10.0.0.1");
        assert_eq!(parsed.city, "");
        assert_eq!(parsed.latitude, 0.0);
        assert_eq!(parsed.metro_code, 0);
        assert_eq!(parsed.country_name, "");
    }

    #[test]
    fn timezone_record_uses_provider_names() {
        let parsed: TimezoneRecord = serde_json::from_value(json!({
            "sunrise": "2024-01-01 07:12",
            "lng": 77.2,
            "countryCode": "IN",
            "gmtOffset": 5.5,
            "rawOffset": 5.5,
            "sunset": "2024-01-01 17:35",
            "timezoneId": "Asia/Kolkata",
            "dstOffset": 5.5,
            "countryName": "India",
            "time": "2024-01-01 12:00",
            "lat": 28.6
        }))
        .unwrap();

        assert_eq!(parsed.timezone_id, "Asia/Kolkata");
        assert_eq!(parsed.gmt_offset, 5.5);
        assert_eq!(parsed.local_time, "2024-01-01 12:00");
        assert_eq!(parsed.latitude, 28.6);
        assert_eq!(parsed.longitude, 77.2);
    }

    #[test]
    fn render_view_takes_location_from_geo_record() {
        let geo: GeoRecord = serde_json::from_value(google_dns()).unwrap();
        let view = RenderView::new("8.8.8.8", &geo, "America/New_York");

        assert_eq!(view.country, "United States");
        assert_eq!(view.region, "Ohio");
        assert_eq!(view.city, "Glenmont");
        assert_eq!(view.latitude, 40.5369);
        assert_eq!(view.timezone_id, "America/New_York");
    }
}
