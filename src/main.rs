use anyhow::{bail, Context, Result};

use luma_scrape::extract;
use luma_scrape::geocode::{GeocodeError, GooglePlacesClient, PlaceLookup};
use luma_scrape::models::PlaceDetails;
use tracing::warn;

/// Stand-in used when no API key is configured; every lookup is a miss, which
/// routes geo-tagged pages through the embedded-JSON degradation path.
struct NoLookup;

#[async_trait::async_trait]
impl PlaceLookup for NoLookup {
    async fn lookup_place(&self, _place_id: &str) -> Result<Option<PlaceDetails>, GeocodeError> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let target = match std::env::args().nth(1) {
        Some(target) => target,
        None => bail!("usage: luma-scrape <event-url-or-html-file>"),
    };

    let places: Box<dyn PlaceLookup> = match GooglePlacesClient::from_env() {
        Ok(client) => Box::new(client),
        Err(error) => {
            warn!("{error}; place lookups disabled");
            Box::new(NoLookup)
        }
    };

    let record = if target.starts_with("http://") || target.starts_with("https://") {
        extract::import_event(&target, places.as_ref()).await?
    } else {
        let html = std::fs::read_to_string(&target)
            .with_context(|| format!("unable to read {target}"))?;
        extract::extract_event(&html, places.as_ref()).await
    };

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
