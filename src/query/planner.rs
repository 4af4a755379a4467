use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use super::channels::{default_channels, ChannelConfig};
use crate::config::Settings;
use crate::event::RainEvent;
use crate::terminology::{LocationProfile, DEFAULT_FLOOD_TERM, DEFAULT_RAIN_TERM, ENGLISH_CODE};

/// Keywords for one language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordBundle {
    pub language: String,
    pub location_terms: Vec<String>,
    pub disaster_terms: Vec<String>,
    pub time_terms: Vec<String>,
    pub date_phrase: Option<String>,
    /// Region(+country), deduplicated disaster terms, then the date phrase.
    pub query: String,
}

impl KeywordBundle {
    /// Location and disaster terms, deduplicated, in plan order.
    pub fn keywords(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for term in self.location_terms.iter().chain(self.disaster_terms.iter()) {
            let term = term.trim();
            if !term.is_empty() && !out.iter().any(|t| t == term) {
                out.push(term.to_string());
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    pub bundles: Vec<KeywordBundle>,
    pub channels: Vec<ChannelConfig>,
    pub event_year: Option<i32>,
    pub lookback_hours: i64,
    pub news_window_days: i64,
}

impl QueryPlan {
    pub fn bundle(&self, language: &str) -> Option<&KeywordBundle> {
        self.bundles.iter().find(|b| b.language == language)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.name == name)
    }
}

/// Build the per-language keyword bundles for an event.
///
/// Rainfall magnitude never enters the query: it over-constrains recall.
pub fn plan(event: &RainEvent, profile: &LocationProfile, settings: &Settings) -> QueryPlan {
    let mut bundles = vec![build_bundle(
        event,
        profile,
        ENGLISH_CODE,
        DEFAULT_RAIN_TERM,
        DEFAULT_FLOOD_TERM,
    )];
    if !profile.is_english() {
        bundles.push(build_bundle(
            event,
            profile,
            &profile.language_code,
            &profile.rain_term,
            &profile.flood_term,
        ));
    }

    for bundle in &bundles {
        debug!("Query plan [{}]: {}", bundle.language, bundle.query);
    }

    QueryPlan {
        bundles,
        channels: default_channels(settings),
        event_year: event.event_time.map(|t| t.year()),
        lookback_hours: settings.max_event_lookback_hours,
        news_window_days: settings.news_search_window_days,
    }
}

fn build_bundle(
    event: &RainEvent,
    profile: &LocationProfile,
    language: &str,
    rain_term: &str,
    flood_term: &str,
) -> KeywordBundle {
    let country = event.country();
    let country_local = if language == ENGLISH_CODE {
        country.map(str::to_string)
    } else {
        profile
            .country_native
            .clone()
            .or_else(|| country.map(str::to_string))
    };

    let mut location_terms: Vec<String> = Vec::new();
    // "region country" when both are known, else the first location term
    let mut query_location: Option<String> = None;
    // The gauge site is rarely the centre of impact; the measurement location
    // only stands in when no region is known.
    let region = event.province().or_else(|| event.location_name());
    if let Some(region) = region {
        location_terms.push(region.to_string());
        if let Some(country) = &country_local {
            let combined = format!("{} {}", region, country);
            query_location = Some(combined.clone());
            location_terms.push(combined);
        }
    }
    if let Some(country) = country_local {
        if !location_terms.contains(&country) {
            location_terms.push(country);
        }
    }

    let mut disaster_terms = vec![rain_term.to_string(), flood_term.to_string()];
    if let Some(severity) = event.severity.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        disaster_terms.push(severity.to_string());
    }

    let date_phrase = event.event_time.map(|t| date_phrase(&t, language));
    let mut time_terms = Vec::new();
    if let Some(phrase) = &date_phrase {
        time_terms.push(phrase.clone());
    }
    if let Some(t) = event.event_time {
        time_terms.push(t.year().to_string());
    }

    let query_location = query_location.or_else(|| location_terms.first().cloned());
    let query = build_query_string(
        query_location.as_deref(),
        &disaster_terms,
        date_phrase.as_deref(),
        event,
    );

    KeywordBundle {
        language: language.to_string(),
        location_terms,
        disaster_terms,
        time_terms,
        date_phrase,
        query,
    }
}

fn build_query_string(
    location: Option<&str>,
    disaster_terms: &[String],
    date_phrase: Option<&str>,
    event: &RainEvent,
) -> String {
    let mut parts: Vec<&str> = Vec::new();

    if let Some(location) = location {
        parts.push(location);
    }

    for term in disaster_terms {
        if !term.is_empty() && !parts.contains(&term.as_str()) {
            parts.push(term);
        }
    }

    let query = parts.join(" ");
    match (date_phrase, event.event_time) {
        (Some(phrase), Some(t)) => query_with_date(&query, t.year(), phrase),
        _ => query,
    }
}

/// Append the date phrase unless the query already names the year.
pub fn query_with_date(query: &str, year: i32, date_phrase: &str) -> String {
    if query.contains(&year.to_string()) || date_phrase.is_empty() {
        query.to_string()
    } else if query.is_empty() {
        date_phrase.to_string()
    } else {
        format!("{} {}", query, date_phrase)
    }
}

const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];
const MONTHS_ES: [&str; 12] = [
    "enero", "febrero", "marzo", "abril", "mayo", "junio", "julio", "agosto", "septiembre",
    "octubre", "noviembre", "diciembre",
];
const MONTHS_FR: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août", "septembre",
    "octobre", "novembre", "décembre",
];
const MONTHS_DE: [&str; 12] = [
    "Januar", "Februar", "März", "April", "Mai", "Juni", "Juli", "August", "September",
    "Oktober", "November", "Dezember",
];
const MONTHS_IT: [&str; 12] = [
    "gennaio", "febbraio", "marzo", "aprile", "maggio", "giugno", "luglio", "agosto",
    "settembre", "ottobre", "novembre", "dicembre",
];
const MONTHS_PT: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];
const MONTHS_NL: [&str; 12] = [
    "januari", "februari", "maart", "april", "mei", "juni", "juli", "augustus", "september",
    "oktober", "november", "december",
];
// Genitive forms, as used in dates
const MONTHS_PL: [&str; 12] = [
    "stycznia", "lutego", "marca", "kwietnia", "maja", "czerwca", "lipca", "sierpnia",
    "września", "października", "listopada", "grudnia",
];
const MONTHS_EL: [&str; 12] = [
    "Ιανουαρίου", "Φεβρουαρίου", "Μαρτίου", "Απριλίου", "Μαΐου", "Ιουνίου", "Ιουλίου",
    "Αυγούστου", "Σεπτεμβρίου", "Οκτωβρίου", "Νοεμβρίου", "Δεκεμβρίου",
];

/// Human-readable date in the language's usual order.
pub fn date_phrase(time: &NaiveDateTime, language: &str) -> String {
    let idx = time.month0() as usize;
    let (day, year) = (time.day(), time.year());
    match language {
        "en" => format!("{} {}, {}", MONTHS_EN[idx], day, year),
        "de" => format!("{}. {} {}", day, MONTHS_DE[idx], year),
        "es" => format!("{} {} {}", day, MONTHS_ES[idx], year),
        "fr" => format!("{} {} {}", day, MONTHS_FR[idx], year),
        "it" => format!("{} {} {}", day, MONTHS_IT[idx], year),
        "pt" => format!("{} de {} de {}", day, MONTHS_PT[idx], year),
        "nl" => format!("{} {} {}", day, MONTHS_NL[idx], year),
        "pl" => format!("{} {} {}", day, MONTHS_PL[idx], year),
        "el" => format!("{} {} {}", day, MONTHS_EL[idx], year),
        _ => time.format("%Y-%m-%d").to_string(),
    }
}
