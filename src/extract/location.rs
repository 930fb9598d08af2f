use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::geocode::PlaceLookup;
use crate::models::Location;

use super::base;

pub const UNSPECIFIED_LOCATION: &str = "Location not specified";
pub const GATED_LOCATION_MESSAGE: &str =
    "Please register to see the exact location of this event";

static ONLINE_EVENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)online\s+event").expect("online event regex"));
static VIRTUAL_EVENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)virtual\s+event").expect("virtual event regex"));
static ZOOM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bzoom\b").expect("zoom regex"));
static ZOOM_NEGATED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)zoom\s+is\s+not").expect("zoom negation regex"));

// Meeting URLs in platform priority order; first hit names the location.
static MEETING_URL_RES: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r#"https?://[\w.-]*zoom\.us/[^\s"'<>]+"#).expect("zoom url regex"),
        Regex::new(r#"https?://meet\.google\.com/[^\s"'<>]+"#).expect("meet url regex"),
        Regex::new(r#"https?://teams\.microsoft\.com/[^\s"'<>]+"#).expect("teams url regex"),
        Regex::new(r#"https?://[\w.-]*webex\.com/[^\s"'<>]+"#).expect("webex url regex"),
    ]
});

const MEETING_PLATFORMS: [(&str, &str); 4] = [
    ("zoom", "Zoom"),
    ("google meet", "Google Meet"),
    ("microsoft teams", "Microsoft Teams"),
    ("webex", "Webex"),
];

static DOMAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://([\w-]+(?:\.[\w-]+)+)").expect("domain regex"));

// The embedded key shows up plain and as a JSON-string with escaped quotes.
static GEO_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\\?"geo_address_info\\?"\s*:\s*\{"#).expect("geo block regex"));
static GEO_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""(place_id|full_address|city_state|address|city|country|description)"\s*:\s*"([^"]*)""#,
    )
    .expect("geo field regex")
});

static ADDRESS_HIDDEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)address.*hidden until").expect("address hidden regex"));
static VENUE_REVEALED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)venue.*revealed").expect("venue revealed regex"));
static LOCATION_HIDDEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)location.{0,200}hidden").expect("location hidden regex"));

// Coarse place patterns for gated pages, scanned over the whole document:
// CJK city+district, CJK city alone, "Xinyi District, Taipei", and
// "Taipei City, Taiwan" style city-comma-country.
static COARSE_PLACE_RES: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"[\p{Han}]{1,6}[市縣][\p{Han}]{1,4}[區鄉鎮]").expect("cjk district regex"),
        Regex::new(r"[\p{Han}]{2,6}[市縣]").expect("cjk city regex"),
        Regex::new(r"\b[A-Z][a-z]+(?:\s[A-Z][a-z]+)?\s+District,\s*[A-Z][a-z]+(?:\s+City)?")
            .expect("district city regex"),
        Regex::new(
            r"\b[A-Z][a-z]+(?:\s[A-Z][a-z]+)?\s*,\s*(?:Taiwan|Japan|Singapore|South Korea|Hong Kong|Thailand|Vietnam|United States)\b",
        )
        .expect("city country regex"),
    ]
});

static LABEL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div, p, span, h2, h3, h4").expect("label selector"));

/// Fields pulled out of the embedded `geo_address_info` block. Every field is
/// optional; the block is rarely complete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoAddressInfo {
    pub place_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub full_address: Option<String>,
    pub description: Option<String>,
    pub city_state: Option<String>,
}

/// Outcome of the synchronous document scan. The parsed DOM stays on this
/// side of the boundary; only the signal crosses into the async resolve step.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSignal {
    Virtual { name: String },
    Place { geo: GeoAddressInfo },
    Address { geo: GeoAddressInfo },
    Gated { info: Option<String> },
    Unspecified,
}

/// Decision procedure over mutually exclusive signals, in fixed priority
/// order: virtual-event markers, embedded geo data with a `place_id`, an
/// address without one, registration-gated phrasing, then nothing at all.
pub fn scan_location(dom: &Html, raw_html: &str) -> LocationSignal {
    if let Some(name) = detect_virtual(raw_html) {
        return LocationSignal::Virtual { name };
    }

    let geo = extract_geo_address_info(raw_html);
    if geo.place_id.is_some() {
        return LocationSignal::Place { geo };
    }
    if geo.full_address.is_some() || geo.address.is_some() {
        return LocationSignal::Address { geo };
    }

    if is_registration_gated(dom, raw_html) {
        let info = coarse_location(dom, raw_html, &geo);
        return LocationSignal::Gated { info };
    }

    LocationSignal::Unspecified
}

/// Turns a scanned signal into the final record, calling the place lookup for
/// `Place` signals. Lookup failures never escape: the location degrades to
/// the embedded-JSON fields instead.
pub async fn resolve_location(signal: LocationSignal, places: &dyn PlaceLookup) -> Location {
    match signal {
        LocationSignal::Virtual { name } => Location::Virtual {
            name,
            description: String::new(),
        },
        LocationSignal::Place { geo } => resolve_place(geo, places).await,
        LocationSignal::Address { geo } => custom_from_geo(&geo),
        LocationSignal::Gated { info } => gated_location(info),
        LocationSignal::Unspecified => Location::custom_named(UNSPECIFIED_LOCATION),
    }
}

fn detect_virtual(raw_html: &str) -> Option<String> {
    let lower = raw_html.to_lowercase();
    let zoom_mentioned = ZOOM_RE.is_match(raw_html) && !ZOOM_NEGATED_RE.is_match(raw_html);
    let triggered = ONLINE_EVENT_RE.is_match(raw_html)
        || VIRTUAL_EVENT_RE.is_match(raw_html)
        || zoom_mentioned
        || lower.contains("webinar");
    if !triggered {
        return None;
    }
    Some(virtual_name(raw_html, &lower))
}

// Meeting URL, then bare platform token, then any non-lu.ma domain, then the
// literal "Virtual".
fn virtual_name(raw_html: &str, lower: &str) -> String {
    for url_re in MEETING_URL_RES.iter() {
        if let Some(found) = url_re.find(raw_html) {
            return found.as_str().to_string();
        }
    }
    for (needle, platform) in MEETING_PLATFORMS {
        if lower.contains(needle) {
            return platform.to_string();
        }
    }
    if let Some(domain) = external_domain(raw_html) {
        return domain;
    }
    "Virtual".to_string()
}

fn external_domain(raw_html: &str) -> Option<String> {
    DOMAIN_RE
        .captures_iter(raw_html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .find(|domain| {
            let lower = domain.to_lowercase();
            lower != "lu.ma" && !lower.ends_with(".lu.ma") && !lower.contains("lumacdn")
        })
}

/// The geo block is cut out by balancing braces from the key onward, then
/// quote-normalized. Fields are pulled with per-field regexes instead of a
/// JSON parse: the captured block is frequently not valid JSON.
pub fn extract_geo_address_info(raw_html: &str) -> GeoAddressInfo {
    let block = match geo_block(raw_html) {
        Some(block) => repair_json_fragment(&block),
        None => return GeoAddressInfo::default(),
    };
    parse_geo_fields(&block)
}

fn geo_block(raw_html: &str) -> Option<String> {
    let key = GEO_BLOCK_RE.find(raw_html)?;
    let open = key.end() - 1;
    let mut depth = 0usize;
    for (offset, byte) in raw_html[open..].bytes().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(raw_html[open..open + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

// Blocks arrive both as plain JSON and embedded in a JSON string with escaped
// quotes; normalize to plain quotes so one set of field regexes covers both.
fn repair_json_fragment(block: &str) -> String {
    block.replace("\\\"", "\"")
}

fn parse_geo_fields(block: &str) -> GeoAddressInfo {
    let mut geo = GeoAddressInfo::default();
    for caps in GEO_FIELD_RE.captures_iter(block) {
        let value = match caps.get(2) {
            Some(m) => base::clean_text(m.as_str()),
            None => continue,
        };
        if value.is_empty() {
            continue;
        }
        let slot = match caps.get(1).map(|m| m.as_str()) {
            Some("place_id") => &mut geo.place_id,
            Some("address") => &mut geo.address,
            Some("city") => &mut geo.city,
            Some("country") => &mut geo.country,
            Some("full_address") => &mut geo.full_address,
            Some("description") => &mut geo.description,
            Some("city_state") => &mut geo.city_state,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    geo
}

async fn resolve_place(geo: GeoAddressInfo, places: &dyn PlaceLookup) -> Location {
    let place_id = geo.place_id.clone().unwrap_or_default();
    match places.lookup_place(&place_id).await {
        Ok(Some(details)) => Location::Google {
            place_id,
            name: or_fallback(details.name, geo.description.clone()),
            full_address: or_fallback(details.full_address, geo.full_address.clone()),
            address: or_fallback(details.address, geo.address.clone()),
            city: or_fallback(details.city, geo.city.clone()),
            country: or_fallback(details.country, geo.country.clone()),
            postal_code: details.postal_code,
            description: String::new(),
        },
        Ok(None) => {
            warn!("place {place_id} not found, keeping embedded geo fields");
            degraded_google(&geo, place_id)
        }
        Err(error) => {
            warn!("place lookup failed for {place_id}: {error}");
            degraded_google(&geo, place_id)
        }
    }
}

fn or_fallback(primary: String, fallback: Option<String>) -> String {
    if primary.is_empty() {
        fallback.unwrap_or_default()
    } else {
        primary
    }
}

// Failed lookups keep the GOOGLE tag and the original place_id; only the
// payload fields fall back to what the embedded JSON carried.
fn degraded_google(geo: &GeoAddressInfo, place_id: String) -> Location {
    Location::Google {
        place_id,
        name: geo.description.clone().unwrap_or_default(),
        full_address: geo.full_address.clone().unwrap_or_default(),
        address: geo.address.clone().unwrap_or_default(),
        city: geo.city.clone().unwrap_or_default(),
        country: geo.country.clone().unwrap_or_default(),
        postal_code: String::new(),
        description: String::new(),
    }
}

fn custom_from_geo(geo: &GeoAddressInfo) -> Location {
    Location::Custom {
        name: geo.description.clone().unwrap_or_default(),
        full_address: geo.full_address.clone().unwrap_or_default(),
        address: geo.address.clone().unwrap_or_default(),
        city: geo.city.clone().unwrap_or_default(),
        country: geo.country.clone().unwrap_or_default(),
        postal_code: String::new(),
        description: String::new(),
    }
}

fn is_registration_gated(dom: &Html, raw_html: &str) -> bool {
    let lower = raw_html.to_lowercase();
    if lower.contains("please register to see the exact location")
        || lower.contains("register to see address")
    {
        return true;
    }
    if lower.contains("request to join") && LOCATION_HIDDEN_RE.is_match(raw_html) {
        return true;
    }
    if ADDRESS_HIDDEN_RE.is_match(raw_html) || VENUE_REVEALED_RE.is_match(raw_html) {
        return true;
    }
    label_sibling_mentions_register(dom)
}

fn label_sibling_mentions_register(dom: &Html) -> bool {
    dom.select(&LABEL_SELECTOR)
        .filter(|element| {
            let text = base::inner_text(*element);
            text == "Location" || text == "Address"
        })
        .any(|label| {
            label
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .any(|sibling| base::inner_text(sibling).to_lowercase().contains("register"))
        })
}

// Best-effort coarse place for a gated page: the geo block's city_state, the
// text after a "Location" label, then the generic place patterns.
fn coarse_location(dom: &Html, raw_html: &str, geo: &GeoAddressInfo) -> Option<String> {
    if let Some(city_state) = &geo.city_state {
        return Some(city_state.clone());
    }
    if let Some(after_label) = text_after_location_label(dom) {
        return Some(after_label);
    }
    COARSE_PLACE_RES
        .iter()
        .find_map(|re| re.find(raw_html))
        .map(|m| base::clean_text(m.as_str()))
}

fn text_after_location_label(dom: &Html) -> Option<String> {
    let label = dom
        .select(&LABEL_SELECTOR)
        .find(|element| base::inner_text(*element) == "Location")?;
    for sibling in label.next_siblings().filter_map(ElementRef::wrap) {
        let text = base::inner_text(sibling);
        if text.is_empty() {
            continue;
        }
        if text.to_lowercase().contains("register") || text.contains("Online") {
            return None;
        }
        return Some(text);
    }
    None
}

fn gated_location(info: Option<String>) -> Location {
    let name = match info {
        Some(info) => format!("[{info}] {GATED_LOCATION_MESSAGE}"),
        None => GATED_LOCATION_MESSAGE.to_string(),
    };
    Location::custom_named(name)
}
