pub mod base;
pub mod fields;
pub mod location;
pub mod schedule;
pub mod tags;

use chrono::{DateTime, Utc};
use scraper::Html;
use tracing::{debug, info};

use crate::geocode::PlaceLookup;
use crate::models::EventRecord;

pub use location::{LocationSignal, GATED_LOCATION_MESSAGE, UNSPECIFIED_LOCATION};
pub use schedule::Schedule;

/// Runs the whole pipeline over one HTML snapshot. Returns a record for any
/// input string: extractors degrade to documented defaults and place-lookup
/// failures are absorbed inside the location resolver.
pub async fn extract_event(html: &str, places: &dyn PlaceLookup) -> EventRecord {
    extract_event_at(html, places, Utc::now()).await
}

/// Same pipeline with an injected clock. `now` only feeds the no-date
/// schedule defaults, which makes the output reproducible in tests.
pub async fn extract_event_at(
    html: &str,
    places: &dyn PlaceLookup,
    now: DateTime<Utc>,
) -> EventRecord {
    // The parsed document is confined to this block; only owned values cross
    // the await below.
    let (title, cover_image, description, schedule, signal) = {
        let dom = Html::parse_document(html);
        let title = fields::extract_title(&dom);
        let cover_image = fields::extract_cover_image(&dom);
        let description = fields::extract_description(&dom, html);
        let schedule = schedule::extract_schedule(&dom, html, now);
        let signal = location::scan_location(&dom, html);
        (title, cover_image, description, schedule, signal)
    };

    let location = location::resolve_location(signal, places).await;
    let category = fields::extract_category(&title, &description);
    let tags = tags::synthesize_tags(&title, &description, &category, &location);
    debug!("extracted '{title}' with {} tags", tags.len());

    EventRecord {
        title,
        description,
        cover_image,
        start_at: schedule.start_at,
        end_at: schedule.end_at,
        timezone: schedule.timezone,
        location,
        category,
        tags,
    }
}

/// Fetches an event page and extracts it in one step.
pub async fn import_event(
    url: &str,
    places: &dyn PlaceLookup,
) -> anyhow::Result<EventRecord> {
    info!("importing event from {url}");
    let html = base::fetch_event_page(url).await?;
    Ok(extract_event(&html, places).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::GeocodeError;
    use crate::models::{Location, PlaceDetails};
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct NoPlaces;

    #[async_trait]
    impl PlaceLookup for NoPlaces {
        async fn lookup_place(
            &self,
            _place_id: &str,
        ) -> Result<Option<PlaceDetails>, GeocodeError> {
            Ok(None)
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
            .single()
            .expect("fixed now")
    }

    #[tokio::test]
    async fn empty_input_yields_full_default_record() {
        let record = extract_event_at("", &NoPlaces, fixed_now()).await;

        assert_eq!(record.title, "");
        assert_eq!(record.description, "");
        assert_eq!(record.cover_image, "");
        assert_eq!(record.start_at, "2025-03-01T12:00:00Z");
        assert_eq!(record.end_at, "2025-03-01T15:00:00Z");
        assert_eq!(record.timezone, "UTC");
        assert_eq!(record.location, Location::custom_named(UNSPECIFIED_LOCATION));
        assert_eq!(record.category, "");
        assert!(record.tags.is_empty());
    }

    #[tokio::test]
    async fn identical_input_gives_identical_output() {
        let html = r#"
        <html><body>
            <h1>Web3 Builders Meetup</h1>
            <div>Jun 7, 2025 10:00 AM - 1:00 PM</div>
            <div>Please register to see the exact location</div>
            <div>Taipei City, Taiwan</div>
        </body></html>
        "#;

        let first = extract_event_at(html, &NoPlaces, fixed_now()).await;
        let second = extract_event_at(html, &NoPlaces, fixed_now()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn tags_reflect_the_resolved_location() {
        let html = r#"
        <html><body>
            <h1>Quiet Gathering</h1>
            <div>Please register to see the exact location</div>
            <div>Taipei City, Taiwan</div>
        </body></html>
        "#;

        let record = extract_event_at(html, &NoPlaces, fixed_now()).await;
        assert!(record.location.name().starts_with("[Taipei City, Taiwan]"));
        assert!(record.tags.contains(&"Taipei".to_string()));
    }
}
