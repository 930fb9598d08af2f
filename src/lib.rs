//! Heuristic extraction of structured event records from lu.ma event pages.
//!
//! The entry point is [`extract::extract_event`], which turns one raw HTML
//! snapshot into an [`models::EventRecord`]. Every extractor is a prioritized
//! list of fallible strategies with documented defaults, so the pipeline never
//! fails for a well-formed string input. The only external collaborator is the
//! place lookup behind [`geocode::PlaceLookup`].

pub mod extract;
pub mod geocode;
pub mod models;

pub use extract::{extract_event, extract_event_at, import_event};
pub use geocode::{GeocodeError, GooglePlacesClient, PlaceLookup};
pub use models::{EventRecord, Location, PlaceDetails};
