use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use serde::Deserialize;

use crate::models::PlaceDetails;

const PLACE_DETAILS_URL: &str = "https://maps.googleapis.com/maps/api/place/details/json";
const PLACE_FIELDS: &str = "name,formatted_address,address_component,geometry/location";
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

static PLACES_CLIENT: Lazy<ClientWithMiddleware> = Lazy::new(|| {
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("http client");
    ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(
            ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES),
        ))
        .build()
});

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("places api status {0}")]
    Status(String),
    #[error("GOOGLE_MAPS_API_KEY is not set")]
    MissingApiKey,
}

/// Resolves a place id to structured place details. `Ok(None)` means the id
/// is unknown to the backend; `Err` is reserved for transport and quota
/// problems.
#[async_trait]
pub trait PlaceLookup: Send + Sync {
    async fn lookup_place(&self, place_id: &str) -> Result<Option<PlaceDetails>, GeocodeError>;
}

#[derive(Debug, Clone)]
pub struct GooglePlacesClient {
    api_key: String,
}

impl GooglePlacesClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Result<Self, GeocodeError> {
        let api_key =
            std::env::var("GOOGLE_MAPS_API_KEY").map_err(|_| GeocodeError::MissingApiKey)?;
        Ok(Self::new(api_key))
    }
}

#[async_trait]
impl PlaceLookup for GooglePlacesClient {
    async fn lookup_place(&self, place_id: &str) -> Result<Option<PlaceDetails>, GeocodeError> {
        let mut url = Url::parse(PLACE_DETAILS_URL)
            .map_err(|err| GeocodeError::Parse(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("place_id", place_id)
            .append_pair("fields", PLACE_FIELDS)
            .append_pair("key", &self.api_key);

        let response = PLACES_CLIENT
            .get(url)
            .send()
            .await
            .map_err(|err| GeocodeError::Http(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| GeocodeError::Http(err.to_string()))?;
        if !status.is_success() {
            return Err(GeocodeError::Http(format!("status {}: {}", status, text)));
        }

        let payload: DetailsResponse =
            serde_json::from_str(&text).map_err(|err| GeocodeError::Parse(err.to_string()))?;
        interpret_response(payload)
    }
}

fn interpret_response(payload: DetailsResponse) -> Result<Option<PlaceDetails>, GeocodeError> {
    match payload.status.as_str() {
        "OK" => Ok(payload.result.map(fold_place)),
        "ZERO_RESULTS" | "NOT_FOUND" => Ok(None),
        other => {
            let detail = payload
                .error_message
                .map(|message| format!(": {message}"))
                .unwrap_or_default();
            Err(GeocodeError::Status(format!("{other}{detail}")))
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<PlaceResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    #[serde(default)]
    name: String,
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    location: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

fn fold_place(result: PlaceResult) -> PlaceDetails {
    let mut street_number = String::new();
    let mut route = String::new();
    let mut locality = String::new();
    let mut admin_area = String::new();
    let mut country = String::new();
    let mut postal_code = String::new();

    for component in &result.address_components {
        for kind in &component.types {
            match kind.as_str() {
                "street_number" => street_number = component.long_name.clone(),
                "route" => route = component.long_name.clone(),
                "locality" => locality = component.long_name.clone(),
                "administrative_area_level_1" => admin_area = component.long_name.clone(),
                "country" => country = component.long_name.clone(),
                "postal_code" => postal_code = component.long_name.clone(),
                _ => {}
            }
        }
    }

    let address = match (street_number.is_empty(), route.is_empty()) {
        (false, false) => format!("{street_number} {route}"),
        (true, false) => route,
        (false, true) => street_number,
        (true, true) => String::new(),
    };
    let city = if locality.is_empty() {
        admin_area
    } else {
        locality
    };
    let (latitude, longitude) = result
        .geometry
        .and_then(|geometry| geometry.location)
        .map(|location| (location.lat, location.lng))
        .unwrap_or((0.0, 0.0));

    PlaceDetails {
        name: result.name,
        address,
        full_address: result.formatted_address,
        city,
        country,
        postal_code,
        latitude,
        longitude,
    }
}
