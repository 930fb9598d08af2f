use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::base;

const ABOUT_LABEL: &str = "About Event";
const DESCRIPTION_MAX_CHARS: usize = 500;
const MIN_FRAGMENT_CHARS: usize = 20;
const PARAGRAPH_MIN_CHARS: usize = 100;
const RAW_WINDOW_CHARS: usize = 1500;

// Image hosts/paths used for event cover art.
const COVER_SRC_MARKERS: [&str; 2] = ["event-covers", "images.lumacdn.com"];

// Framework prop/JSON leakage that shows up as "text" on hydrated pages.
const NOISE_MARKERS: [&str; 4] = ["__typename", "\"props\":", "self.__next_f", "window.__"];

// Section labels that end the structural description walk.
const STOP_PHRASES: [&str; 3] = ["Location", "Going", "Registration"];

// Key carried by raw serialized event objects; prose never contains it.
const SERIALIZED_OBJECT_KEY: &str = "\"api_id\"";

static HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1").expect("heading selector"));
static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("img selector"));
static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p, div").expect("paragraph selector"));
static ANY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("*").expect("any selector"));

pub fn extract_title(dom: &Html) -> String {
    dom.select(&HEADING_SELECTOR)
        .next()
        .map(base::inner_text)
        .unwrap_or_default()
}

pub fn extract_cover_image(dom: &Html) -> String {
    for img in dom.select(&IMG_SELECTOR) {
        if let Some(src) = img.value().attr("src") {
            if COVER_SRC_MARKERS.iter().any(|marker| src.contains(marker)) {
                return src.to_string();
            }
        }
    }
    String::new()
}

/// Three-tier fallback: structural walk after the "About Event" label, then the
/// first long clean paragraph, then a tag-stripped window of the raw HTML.
/// First non-empty result wins; anything that still looks like a serialized
/// object is discarded.
pub fn extract_description(dom: &Html, raw_html: &str) -> String {
    let found = description_after_label(dom)
        .or_else(|| description_from_paragraphs(dom))
        .or_else(|| description_from_raw_window(raw_html));

    let cleaned = base::clean_text(&found.unwrap_or_default());
    if looks_like_serialized_object(&cleaned) {
        return String::new();
    }
    cleaned
}

fn description_after_label(dom: &Html) -> Option<String> {
    let label = find_label_element(dom, ABOUT_LABEL)?;
    let mut parts: Vec<String> = Vec::new();

    for sibling in label.next_siblings() {
        let element = match ElementRef::wrap(sibling) {
            Some(element) => element,
            None => continue,
        };
        if is_heading(element.value().name()) {
            break;
        }
        let text = base::inner_text(element);
        if STOP_PHRASES.iter().any(|phrase| text.contains(phrase)) {
            break;
        }
        if text.chars().count() < MIN_FRAGMENT_CHARS || contains_noise(&text) {
            continue;
        }
        parts.push(text);
    }

    let joined = parts.join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn description_from_paragraphs(dom: &Html) -> Option<String> {
    dom.select(&PARAGRAPH_SELECTOR)
        .map(base::inner_text)
        .find(|text| text.chars().count() > PARAGRAPH_MIN_CHARS && !contains_noise(text))
}

fn description_from_raw_window(raw_html: &str) -> Option<String> {
    let label_at = raw_html.find(ABOUT_LABEL)?;
    let window: String = raw_html[label_at + ABOUT_LABEL.len()..]
        .chars()
        .take(RAW_WINDOW_CHARS)
        .collect();
    let text = base::clean_text(&base::strip_tags(&window));
    if text.is_empty() {
        None
    } else {
        Some(base::truncate_chars(&text, DESCRIPTION_MAX_CHARS))
    }
}

fn find_label_element<'a>(dom: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    dom.select(&ANY_SELECTOR)
        .find(|element| base::inner_text(*element) == label)
}

fn is_heading(tag: &str) -> bool {
    matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn contains_noise(text: &str) -> bool {
    NOISE_MARKERS.iter().any(|marker| text.contains(marker))
}

fn looks_like_serialized_object(text: &str) -> bool {
    text.starts_with('{') && text.contains(SERIALIZED_OBJECT_KEY)
}

// Ordered keyword table; first hit names the category.
const CATEGORY_KEYWORDS: [(&str, &str); 9] = [
    ("hackathon", "Hackathon"),
    ("conference", "Conference"),
    ("summit", "Conference"),
    ("workshop", "Workshop"),
    ("meetup", "Meetup"),
    ("webinar", "Webinar"),
    ("networking", "Networking"),
    ("demo day", "Demo Day"),
    ("party", "Party"),
];

pub fn extract_category(title: &str, description: &str) -> String {
    let haystack = format!("{title} {description}").to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map(|(_, category)| (*category).to_string())
        .unwrap_or_default()
}
