use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

use super::base;

pub const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_DURATION_HOURS: i64 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub start_at: String,
    pub end_at: String,
    pub timezone: String,
}

// "Jun 5, 2025" / "June 5" (month first) or "5 Jun 2025" (day first).
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:",
        r"(?P<month_a>jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+",
        r"(?P<day_a>\d{1,2})(?:st|nd|rd|th)?(?:,?\s*(?P<year_a>\d{4}))?",
        r"|",
        r"(?P<day_b>\d{1,2})(?:st|nd|rd|th)?\s+",
        r"(?P<month_b>jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?",
        r"(?:,?\s*(?P<year_b>\d{4}))?",
        r")"
    ))
    .expect("date regex")
});

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(am|pm)?\b").expect("time regex"));

static UTC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bUTC\b").expect("utc regex"));
static GMT_OFFSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bGMT[+-]\d{1,2}(?::\d{2})?\b").expect("gmt offset regex"));
static IANA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z_]+/[A-Z][A-Za-z_]+(?:/[A-Z][A-Za-z_]+)?\b").expect("iana regex")
});
static TZ_ABBR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2,3}T\b").expect("tz abbreviation regex"));

static START_AT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""start_at"\s*:\s*"([^"]+)""#).expect("start_at regex"));
static END_AT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""end_at"\s*:\s*"([^"]+)""#).expect("end_at regex"));
static JSON_TZ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""timezone"\s*:\s*"([^"]+)""#).expect("json timezone regex"));
static TIME_ADJACENT_ABBR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{1,2}:\d{2}\s*(?:[AaPp][Mm])?\s+([A-Z]{2,3}T)\b")
        .expect("time-adjacent tz regex")
});
static US_TZ_ABBR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(EDT|EST|PDT|PST|CDT|CST|MDT|MST)\b").expect("us tz regex"));

/// Candidate sources for the visible-text timezone, lowest precedence first.
/// The scan applies every rule in order and keeps the last hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TzRule {
    UtcLiteral,
    GmtOffset,
    IanaName,
    Abbreviation,
}

pub const TZ_RULE_ORDER: [TzRule; 4] = [
    TzRule::UtcLiteral,
    TzRule::GmtOffset,
    TzRule::IanaName,
    TzRule::Abbreviation,
];

/// Two strategies, first hit wins: visible text nodes carrying a date plus one
/// or two clock times, then the page's embedded `start_at`/`end_at` JSON.
/// `now` only feeds the no-date default and year-less visible dates.
pub fn extract_schedule(dom: &Html, raw_html: &str, now: DateTime<Utc>) -> Schedule {
    let (times, dom_timezone) = scan_text_nodes(dom, now);

    if let Some((start_at, end_at)) = times {
        return Schedule {
            start_at,
            end_at,
            timezone: dom_timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        };
    }

    if let Some(schedule) = embedded_schedule(raw_html) {
        return schedule;
    }

    Schedule {
        start_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        end_at: (now + Duration::hours(DEFAULT_DURATION_HOURS))
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        timezone: DEFAULT_TIMEZONE.to_string(),
    }
}

fn scan_text_nodes(dom: &Html, now: DateTime<Utc>) -> (Option<(String, String)>, Option<String>) {
    let mut times: Option<(String, String)> = None;
    let mut timezone: Option<String> = None;

    for node in dom.tree.nodes() {
        let text_node = match node.value().as_text() {
            Some(text) => text,
            None => continue,
        };
        let parent_name = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name().to_string()));
        if matches!(
            parent_name.as_deref(),
            Some("script") | Some("style") | Some("noscript")
        ) {
            continue;
        }
        let text = base::clean_text(&text_node.text);
        if text.is_empty() {
            continue;
        }

        if times.is_none() {
            times = parse_date_times(&text, now);
        }
        if mentions_timezone(&text) {
            for rule in TZ_RULE_ORDER {
                if let Some(found) = apply_tz_rule(rule, &text) {
                    timezone = Some(found);
                }
            }
        }
    }

    (times, timezone)
}

fn parse_date_times(text: &str, now: DateTime<Utc>) -> Option<(String, String)> {
    let caps = DATE_RE.captures(text)?;
    let (month, day, year) = date_parts(&caps, now)?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let mut found: Vec<NaiveTime> = Vec::new();
    for time_caps in TIME_RE.captures_iter(text) {
        if let Some(time) = to_24h(&time_caps) {
            found.push(time);
            if found.len() == 2 {
                break;
            }
        }
    }

    let start = date.and_time(*found.first()?);
    let end = match found.get(1) {
        Some(end_time) => {
            let mut end = date.and_time(*end_time);
            if end < start {
                // second clock time past midnight
                end += Duration::hours(24);
            }
            end
        }
        None => start + Duration::hours(DEFAULT_DURATION_HOURS),
    };

    Some((
        start.format("%Y-%m-%dT%H:%M:%S").to_string(),
        end.format("%Y-%m-%dT%H:%M:%S").to_string(),
    ))
}

fn date_parts(caps: &regex::Captures<'_>, now: DateTime<Utc>) -> Option<(u32, u32, i32)> {
    let (month_name, day, year) = if let Some(month) = caps.name("month_a") {
        (
            month.as_str(),
            caps.name("day_a")?.as_str(),
            caps.name("year_a"),
        )
    } else {
        (
            caps.name("month_b")?.as_str(),
            caps.name("day_b")?.as_str(),
            caps.name("year_b"),
        )
    };

    let month = month_number(month_name)?;
    let day: u32 = day.parse().ok()?;
    let year: i32 = match year {
        Some(matched) => matched.as_str().parse().ok()?,
        None => now.year(),
    };
    Some((month, day, year))
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .position(|month| lower.starts_with(month))
        .map(|idx| idx as u32 + 1)
}

fn to_24h(caps: &regex::Captures<'_>) -> Option<NaiveTime> {
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2)?.as_str().parse().ok()?;
    let hour = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(meridiem) if meridiem == "pm" && hour < 12 => hour + 12,
        Some(meridiem) if meridiem == "am" && hour == 12 => 0,
        _ => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn mentions_timezone(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("timezone")
        || lower.contains("utc")
        || lower.contains("gmt")
        || TZ_ABBR_RE.is_match(text)
}

fn apply_tz_rule(rule: TzRule, text: &str) -> Option<String> {
    match rule {
        TzRule::UtcLiteral => UTC_RE.find(text).map(|m| m.as_str().to_string()),
        TzRule::GmtOffset => GMT_OFFSET_RE.find(text).map(|m| m.as_str().to_string()),
        TzRule::IanaName => IANA_RE
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|candidate| chrono_tz::Tz::from_str(candidate).is_ok())
            .map(str::to_string),
        TzRule::Abbreviation => TZ_ABBR_RE
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|code| *code != "GMT" && *code != "UTC")
            .last()
            .map(str::to_string),
    }
}

fn embedded_schedule(raw_html: &str) -> Option<Schedule> {
    let start_at = START_AT_RE
        .captures(raw_html)?
        .get(1)?
        .as_str()
        .to_string();
    let end_at = match END_AT_RE.captures(raw_html).and_then(|caps| caps.get(1)) {
        Some(end) => end.as_str().to_string(),
        None => add_hours_rfc3339(&start_at, DEFAULT_DURATION_HOURS)
            .unwrap_or_else(|| start_at.clone()),
    };

    Some(Schedule {
        start_at,
        end_at,
        timezone: embedded_timezone(raw_html),
    })
}

fn add_hours_rfc3339(timestamp: &str, hours: i64) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(timestamp).ok()?;
    Some((parsed + Duration::hours(hours)).to_rfc3339_opts(SecondsFormat::Secs, true))
}

// Embedded-JSON path timezone, lowest precedence first: the JSON field when it
// looks canonical (UTC or Region/City), a GMT offset anywhere in the page, the
// raw JSON value as-is; a time-adjacent abbreviation overrides those, and the
// last standalone US abbreviation overrides everything.
fn embedded_timezone(raw_html: &str) -> String {
    let json_tz = JSON_TZ_RE
        .captures(raw_html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let mut timezone = DEFAULT_TIMEZONE.to_string();

    match &json_tz {
        Some(tz) if tz == "UTC" || tz.contains('/') => timezone = tz.clone(),
        Some(tz) => {
            timezone = match GMT_OFFSET_RE.find(raw_html) {
                Some(offset) => offset.as_str().to_string(),
                None => tz.clone(),
            };
        }
        None => {
            if let Some(offset) = GMT_OFFSET_RE.find(raw_html) {
                timezone = offset.as_str().to_string();
            }
        }
    }

    if let Some(code) = TIME_ADJACENT_ABBR_RE
        .captures_iter(raw_html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|code| *code != "GMT" && *code != "UTC")
    {
        timezone = code.to_string();
    }

    if let Some(code) = US_TZ_ABBR_RE.find_iter(raw_html).last() {
        timezone = code.as_str().to_string();
    }

    timezone
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().expect("fixed now")
    }

    fn schedule_for(html: &str) -> Schedule {
        let dom = Html::parse_document(html);
        extract_schedule(&dom, html, fixed_now())
    }

    #[test]
    fn rule_order_is_increasing_precedence() {
        assert_eq!(
            TZ_RULE_ORDER,
            [
                TzRule::UtcLiteral,
                TzRule::GmtOffset,
                TzRule::IanaName,
                TzRule::Abbreviation,
            ]
        );
    }

    #[test]
    fn dom_scan_reads_date_and_both_times() {
        let schedule =
            schedule_for("<div>Sat, Jun 7, 2025 10:00 AM - 1:00 PM GMT+8</div>");
        assert_eq!(schedule.start_at, "2025-06-07T10:00:00");
        assert_eq!(schedule.end_at, "2025-06-07T13:00:00");
        assert_eq!(schedule.timezone, "GMT+8");
    }

    #[test]
    fn dom_scan_accepts_day_first_dates() {
        let schedule = schedule_for("<div>7 Jun 2025, 19:30 - 22:00</div>");
        assert_eq!(schedule.start_at, "2025-06-07T19:30:00");
        assert_eq!(schedule.end_at, "2025-06-07T22:00:00");
    }

    #[test]
    fn twelve_hour_edge_cases_convert() {
        let schedule = schedule_for("<div>Dec 31, 2024 12:00 AM to 12:30 PM</div>");
        assert_eq!(schedule.start_at, "2024-12-31T00:00:00");
        assert_eq!(schedule.end_at, "2024-12-31T12:30:00");
    }

    #[test]
    fn missing_second_time_synthesizes_three_hours() {
        let schedule = schedule_for("<div>Jun 7, 2025 10:00 AM</div>");
        assert_eq!(schedule.start_at, "2025-06-07T10:00:00");
        assert_eq!(schedule.end_at, "2025-06-07T13:00:00");
    }

    #[test]
    fn end_past_midnight_rolls_to_next_day() {
        let schedule = schedule_for("<div>Jun 7, 2025 10:00 PM - 1:00 AM</div>");
        assert_eq!(schedule.start_at, "2025-06-07T22:00:00");
        assert_eq!(schedule.end_at, "2025-06-08T01:00:00");
    }

    #[test]
    fn year_less_dates_use_injected_year() {
        let schedule = schedule_for("<div>June 5 · 9:00 AM</div>");
        assert_eq!(schedule.start_at, "2025-06-05T09:00:00");
    }

    #[test]
    fn script_text_is_not_visible_schedule() {
        let schedule =
            schedule_for("<script>var x = 'Jun 7, 2025 10:00 AM';</script>");
        // no visible date: defaults from the injected clock
        assert_eq!(schedule.start_at, "2025-03-01T12:00:00Z");
        assert_eq!(schedule.end_at, "2025-03-01T15:00:00Z");
        assert_eq!(schedule.timezone, "UTC");
    }

    #[test]
    fn iana_candidates_are_validated() {
        let good = schedule_for(
            "<div>Jun 7, 2025 10:00 AM</div><div>Timezone: Asia/Taipei</div>",
        );
        assert_eq!(good.timezone, "Asia/Taipei");

        let bogus = schedule_for(
            "<div>Jun 7, 2025 10:00 AM</div><div>Timezone: Terms/Privacy</div>",
        );
        assert_eq!(bogus.timezone, "UTC");
    }

    #[test]
    fn five_letter_caps_words_are_not_timezones() {
        let schedule =
            schedule_for("<div>Jun 7, 2025 10:00 AM</div><div>GRAND NIGHT EVENT</div>");
        assert_eq!(schedule.timezone, "UTC");
    }

    #[test]
    fn four_letter_abbreviations_still_match() {
        let schedule =
            schedule_for("<div>Jun 7, 2025 10:00 AM</div><div>All times in AEDT</div>");
        assert_eq!(schedule.timezone, "AEDT");
    }

    #[test]
    fn later_abbreviation_overwrites_earlier_sources() {
        let schedule = schedule_for(
            "<div>Jun 7, 2025 10:00 AM GMT+2</div><div>All times UTC</div><div>Doors listed in PST</div>",
        );
        assert_eq!(schedule.timezone, "PST");
    }

    #[test]
    fn embedded_start_without_end_adds_three_hours() {
        let html = r#"<script>{"start_at":"2025-06-01T10:00:00Z","name":"x"}</script>"#;
        let schedule = schedule_for(html);
        assert_eq!(schedule.start_at, "2025-06-01T10:00:00Z");
        assert_eq!(schedule.end_at, "2025-06-01T13:00:00Z");
        assert_eq!(schedule.timezone, "UTC");
    }

    #[test]
    fn embedded_end_is_used_verbatim() {
        let html = r#"{"start_at":"2025-06-01T10:00:00+08:00","end_at":"2025-06-01T11:30:00+08:00"}"#;
        let schedule = schedule_for(html);
        assert_eq!(schedule.end_at, "2025-06-01T11:30:00+08:00");
    }

    #[test]
    fn embedded_timezone_keeps_canonical_json_values() {
        let html = r#"{"start_at":"2025-06-01T10:00:00Z","timezone":"Asia/Taipei"}"#;
        assert_eq!(schedule_for(html).timezone, "Asia/Taipei");
    }

    #[test]
    fn embedded_timezone_prefers_gmt_offset_over_odd_json_value() {
        let html =
            r#"{"start_at":"2025-06-01T10:00:00Z","timezone":"Taipei Standard Time"} GMT+8"#;
        assert_eq!(schedule_for(html).timezone, "GMT+8");
    }

    #[test]
    fn embedded_timezone_falls_back_to_raw_json_value() {
        let html = r#"{"start_at":"2025-06-01T10:00:00Z","timezone":"Taipei Standard Time"}"#;
        assert_eq!(schedule_for(html).timezone, "Taipei Standard Time");
    }

    #[test]
    fn time_adjacent_abbreviation_overrides_json_field() {
        let html = r#"{"start_at":"2025-06-01T10:00:00Z","timezone":"Asia/Taipei"} Doors 7:00 PM JST"#;
        assert_eq!(schedule_for(html).timezone, "JST");
    }

    #[test]
    fn time_adjacent_scan_ignores_caps_words_ending_in_t() {
        let html =
            r#"{"start_at":"2025-06-01T10:00:00Z","timezone":"Asia/Taipei"} Doors 7:00 PM EVENT"#;
        assert_eq!(schedule_for(html).timezone, "Asia/Taipei");
    }

    #[test]
    fn last_us_abbreviation_overrides_everything() {
        let html = r#"{"start_at":"2025-06-01T10:00:00Z","timezone":"Asia/Taipei"} 7:00 PM JST ... PST ... EST"#;
        assert_eq!(schedule_for(html).timezone, "EST");
    }

    #[test]
    fn no_signals_default_to_now_plus_three_hours() {
        let schedule = schedule_for("<p>nothing datelike here</p>");
        assert_eq!(schedule.start_at, "2025-03-01T12:00:00Z");
        assert_eq!(schedule.end_at, "2025-03-01T15:00:00Z");
        assert_eq!(schedule.timezone, DEFAULT_TIMEZONE);
    }
}
