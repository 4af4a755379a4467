use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// Parse a timestamp in any of the shapes the event store and the search
/// providers emit. Zoned values are normalized to UTC and returned naive.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    // Try RFC3339
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc).naive_utc());
    }

    // Trailing Z on an otherwise naive value, e.g. 2025-10-11T08:00Z
    if let Some(stripped) = value.strip_suffix('Z') {
        if let Some(date) = parse_naive(stripped) {
            return Some(date);
        }
    }

    // Try RFC2822
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc).naive_utc());
    }

    if let Ok(date) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(date.with_timezone(&Utc).naive_utc());
    }

    parse_naive(value)
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    for format in NAIVE_FORMATS {
        if let Ok(date) = NaiveDateTime::parse_from_str(value, format) {
            return Some(date);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-block regex"));

/// Remove `<think>...</think>` reasoning blocks some local models emit.
/// An unterminated block swallows the rest of the text.
pub fn strip_thinking_tags(text: &str) -> String {
    let cleaned = THINK_BLOCK.replace_all(text, "");
    match cleaned.find("<think>") {
        Some(idx) => cleaned[..idx].trim().to_string(),
        None => cleaned.trim().to_string(),
    }
}

/// Replace path separators so an identifier can be used as a file name.
pub fn safe_file_stem(id: &str) -> String {
    id.replace(['/', '\\'], "_")
}
