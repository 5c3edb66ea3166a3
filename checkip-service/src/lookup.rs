use common::models::{GeoRecord, RenderView};
use tracing::{info, instrument, warn};

use crate::geo_client::GeoClient;
use crate::timezone_client::TimezoneClient;

/// Resolves a client IP into everything the index page shows.
///
/// The timezone lookup needs the coordinates from the geo lookup, so the two
/// provider calls always run one after the other.
pub struct LookupService {
    geo: GeoClient,
    timezone: TimezoneClient,
}

impl LookupService {
    pub fn new(geo: GeoClient, timezone: TimezoneClient) -> Self {
        Self { geo, timezone }
    }

    /// Never fails: a stage that errors leaves its fields blank.
    #[instrument(skip(self), fields(client_ip = %client_ip))]
    pub async fn lookup(&self, client_ip: &str) -> RenderView {
        if client_ip.is_empty() {
            warn!("No client IP available, skipping lookups");
            return RenderView::default();
        }

        let geo = match self.geo.resolve(client_ip).await {
            Ok(geo) => geo,
            Err(e) => {
                warn!(error = %e, "Geo lookup failed, rendering without location");
                return RenderView::new(client_ip, &GeoRecord::default(), "");
            }
        };

        let timezone_id = match self.timezone.resolve(geo.latitude, geo.longitude).await {
            Ok(timezone_id) => timezone_id,
            Err(e) => {
                warn!(error = %e, "Timezone lookup failed, rendering without timezone");
                String::new()
            }
        };

        info!(
            country = %geo.country_name,
            timezone = %timezone_id,
            "Lookup completed"
        );

        RenderView::new(client_ip, &geo, timezone_id)
    }
}
