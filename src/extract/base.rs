use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::ElementRef;

// Zero-width and otherwise invisible characters that survive DOM text
// extraction and break downstream string matching.
const INVISIBLE_CHARS: [char; 6] = [
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // zero width no-break space
    '\u{00AD}', // soft hyphen
];

/// Collapses whitespace runs to single spaces, removes invisible characters,
/// trims. Total and idempotent.
pub fn clean_text(input: &str) -> String {
    input
        .chars()
        .filter(|ch| !INVISIBLE_CHARS.contains(ch))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drops everything between `<` and `>` from a raw HTML fragment. Script and
/// style bodies are kept as text; callers guard against leaked markup
/// separately.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len() / 2);
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Caps `input` at `max` characters, ellipsis included, when truncated.
pub fn truncate_chars(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub async fn fetch_event_page(url: &str) -> Result<String> {
    static CLIENT: Lazy<Client> = Lazy::new(|| {
        Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("LumaScrape/0.1 (+https://github.com/mike/luma-scrape)")
            .build()
            .expect("http client")
    });

    let response = CLIENT
        .get(url)
        .send()
        .await
        .with_context(|| format!("request failed for {url}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {url}"))?;
    response
        .text()
        .await
        .with_context(|| format!("unable to read response body for {url}"))
}
