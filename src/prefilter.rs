//! Rule-based relevance screen applied before any model call.
//!
//! Each item is checked independently for a time match, a location match and a
//! keyword match. Strict mode keeps an item only when all three pass, loose mode
//! when any one does. Media/social items and the rest are screened separately
//! and merged media-first so that visual evidence is not crowded out.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::collectors::CollectedItem;
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::event::RainEvent;
use crate::terminology::{LocationProfile, DEFAULT_FLOOD_TERM, DEFAULT_RAIN_TERM};
use crate::util::{parse_datetime, truncate_chars};
use crate::TARGET_PIPELINE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Time, location and keyword must all match.
    Strict,
    /// Any single match keeps the item.
    Loose,
}

impl std::str::FromStr for FilterMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(FilterMode::Strict),
            "loose" => Ok(FilterMode::Loose),
            other => Err(PipelineError::Configuration(format!(
                "unknown PRE_FILTER_MODE '{}', expected strict or loose",
                other
            ))),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::Strict => write!(f, "strict"),
            FilterMode::Loose => write!(f, "loose"),
        }
    }
}

/// What the screen compares items against, lowercased once per event.
#[derive(Debug, Clone)]
pub struct EventInfo {
    pub event_time: Option<NaiveDateTime>,
    pub places: Vec<String>,
    pub terms: Vec<String>,
}

impl EventInfo {
    pub fn new(event: &RainEvent, profile: &LocationProfile) -> Self {
        let mut places = Vec::new();
        for place in [
            event.province(),
            event.country(),
            profile.country_native.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            push_unique(&mut places, place);
        }

        // English coverage of foreign events is common, so the English nouns
        // always count alongside the localized ones.
        let mut terms = Vec::new();
        for term in [
            profile.rain_term.as_str(),
            profile.flood_term.as_str(),
            DEFAULT_RAIN_TERM,
            DEFAULT_FLOOD_TERM,
        ] {
            push_unique(&mut terms, term);
        }

        Self {
            event_time: event.event_time,
            places,
            terms,
        }
    }
}

fn push_unique(out: &mut Vec<String>, value: &str) {
    let value = value.trim().to_lowercase();
    if !value.is_empty() && !out.contains(&value) {
        out.push(value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterChecks {
    pub time: bool,
    pub location: bool,
    pub keyword: bool,
}

impl FilterChecks {
    pub fn keeps(&self, mode: FilterMode) -> bool {
        match mode {
            FilterMode::Strict => self.time && self.location && self.keyword,
            FilterMode::Loose => self.time || self.location || self.keyword,
        }
    }

    fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if !self.time {
            reasons.push("published outside the event window".to_string());
        }
        if !self.location {
            reasons.push("no mention of the region or country".to_string());
        }
        if !self.keyword {
            reasons.push("no rain or flood keyword".to_string());
        }
        reasons
    }
}

/// Audit entry for one rejected item.
#[derive(Debug, Clone, Serialize)]
pub struct FilterLog {
    /// Position in the collected list handed to the screen.
    pub index: usize,
    pub channel: String,
    pub title: String,
    pub url: String,
    pub checks: FilterChecks,
    pub reasons: Vec<String>,
    pub mode: FilterMode,
}

impl fmt::Display for FilterLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} <{}> time={} location={} keyword={} mode={}: {}",
            self.index,
            self.title,
            self.url,
            self.checks.time,
            self.checks.location,
            self.checks.keyword,
            self.mode,
            self.reasons.join("; ")
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct PrefilterOutcome {
    pub kept: Vec<CollectedItem>,
    pub rejected: Vec<FilterLog>,
    /// Media/social items that passed, before the media cap.
    pub media_passed: usize,
    pub others_passed: usize,
}

pub fn evaluate(item: &CollectedItem, info: &EventInfo, window_days: i64) -> FilterChecks {
    let text = format!("{} {}", item.title, item.summary).to_lowercase();
    FilterChecks {
        time: match info.event_time {
            Some(event_time) => time_matches(item, event_time, window_days),
            None => true,
        },
        location: info.places.is_empty() || info.places.iter().any(|p| text.contains(p.as_str())),
        keyword: info.terms.iter().any(|t| text.contains(t.as_str())),
    }
}

/// Screen `items` in one pass. Indices in the log refer to `items`.
pub fn prefilter(
    items: &[CollectedItem],
    info: &EventInfo,
    mode: FilterMode,
    window_days: i64,
) -> (Vec<CollectedItem>, Vec<FilterLog>) {
    screen(items.iter().enumerate(), info, mode, window_days)
}

fn screen<'a>(
    items: impl Iterator<Item = (usize, &'a CollectedItem)>,
    info: &EventInfo,
    mode: FilterMode,
    window_days: i64,
) -> (Vec<CollectedItem>, Vec<FilterLog>) {
    let mut kept = Vec::new();
    let mut rejected = Vec::new();
    for (index, item) in items {
        let checks = evaluate(item, info, window_days);
        if checks.keeps(mode) {
            kept.push(item.clone());
            continue;
        }
        let log = FilterLog {
            index,
            channel: item.channel.clone(),
            title: truncate_chars(&item.title, 100).to_string(),
            url: item.url.clone(),
            checks,
            reasons: checks.reasons(),
            mode,
        };
        debug!(target: TARGET_PIPELINE, "Pre-filter dropped {}", log);
        rejected.push(log);
    }
    (kept, rejected)
}

/// Screen media/social and other items separately, then take up to
/// `media_cap` media items followed by others up to `total_cap`.
pub fn prefilter_with_priority(
    items: &[CollectedItem],
    info: &EventInfo,
    settings: &Settings,
) -> PrefilterOutcome {
    let mode = settings.pre_filter_mode;
    let window = settings.pre_filter_time_window_days;

    let (media, media_log) = screen(
        items.iter().enumerate().filter(|(_, i)| i.is_priority()),
        info,
        mode,
        window,
    );
    let (others, others_log) = screen(
        items.iter().enumerate().filter(|(_, i)| !i.is_priority()),
        info,
        mode,
        window,
    );

    let media_passed = media.len();
    let others_passed = others.len();
    let kept = merge_media_first(
        media,
        others,
        settings.pre_filter_media_cap,
        settings.pre_filter_total_cap,
    );

    let mut rejected = media_log;
    rejected.extend(others_log);
    rejected.sort_by_key(|log| log.index);

    info!(
        target: TARGET_PIPELINE,
        "Pre-filter ({}): {} media passed, {} others passed, {} kept, {} rejected",
        mode,
        media_passed,
        others_passed,
        kept.len(),
        rejected.len()
    );

    PrefilterOutcome {
        kept,
        rejected,
        media_passed,
        others_passed,
    }
}

/// Media first up to `media_cap`, then others until `total_cap`. Input order
/// is otherwise preserved.
pub fn merge_media_first<T>(media: Vec<T>, others: Vec<T>, media_cap: usize, total_cap: usize) -> Vec<T> {
    let mut merged: Vec<T> = media.into_iter().take(media_cap.min(total_cap)).collect();
    let remaining = total_cap.saturating_sub(merged.len());
    merged.extend(others.into_iter().take(remaining));
    merged
}

fn time_matches(item: &CollectedItem, event_time: NaiveDateTime, window_days: i64) -> bool {
    let Some(published) = publication_time(item) else {
        // Nothing to judge by; leave it to validation.
        return true;
    };
    let event_day = event_time.date().and_hms_opt(0, 0, 0).unwrap_or(event_time);
    if published < event_day {
        return false;
    }
    (published - event_time).num_days() <= window_days
}

/// Explicit timestamp, else a date in the url, else a date in the text.
pub fn publication_time(item: &CollectedItem) -> Option<NaiveDateTime> {
    item.published_at
        .as_deref()
        .and_then(parse_datetime)
        .or_else(|| date_from_url(&item.url))
        .or_else(|| date_from_text(&format!("{} {}", item.title, item.summary)))
}

static URL_DATE: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})/").expect("valid url date regex"),
        Regex::new(r"/(\d{4})-(\d{1,2})-(\d{1,2})/").expect("valid url date regex"),
    ]
});

static TEXT_MONTH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)\.?\s+(\d{1,2}),\s+(\d{4})",
    )
    .expect("valid month date regex")
});

static TEXT_ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").expect("valid iso date regex"));

static TEXT_US_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{4})").expect("valid us date regex"));

fn midnight(year: &str, month: &str, day: &str) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?
        .and_hms_opt(0, 0, 0)
}

pub fn date_from_url(url: &str) -> Option<NaiveDateTime> {
    URL_DATE.iter().find_map(|re| {
        let caps = re.captures(url)?;
        midnight(&caps[1], &caps[2], &caps[3])
    })
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// `October 29, 2025`, then `2025-10-29`, then `10/29/2025`.
pub fn date_from_text(text: &str) -> Option<NaiveDateTime> {
    if let Some(caps) = TEXT_MONTH_DATE.captures(text) {
        let parsed = month_number(&caps[1])
            .and_then(|m| midnight(&caps[3], &m.to_string(), &caps[2]));
        if parsed.is_some() {
            return parsed;
        }
    }
    if let Some(caps) = TEXT_ISO_DATE.captures(text) {
        if let Some(date) = midnight(&caps[1], &caps[2], &caps[3]) {
            return Some(date);
        }
    }
    let caps = TEXT_US_DATE.captures(text)?;
    midnight(&caps[3], &caps[1], &caps[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ChannelKind;
    use crate::terminology::TerminologyResolver;
    use chrono::Datelike;

    fn valencia() -> EventInfo {
        let mut event = RainEvent::new("20251011_Valencia_1");
        event.event_time = NaiveDate::from_ymd_opt(2025, 10, 11).and_then(|d| d.and_hms_opt(6, 0, 0));
        event.country = Some("Spain".to_string());
        event.extras.province = Some("Valencia".to_string());
        let profile = TerminologyResolver::builtin().resolve(&event);
        EventInfo::new(&event, &profile)
    }

    fn item(title: &str, url: &str, published_at: Option<&str>, kind: ChannelKind) -> CollectedItem {
        let mut item = CollectedItem::new("en", title, "", url).published(published_at);
        item.kind = kind;
        item.channel = format!("{:?}", kind).to_lowercase();
        item
    }

    #[test]
    fn test_rejection_line_is_complete() {
        let info = valencia();
        let items = vec![item(
            "Valencia football",
            "https://a.example/2",
            Some("2025-10-12T00:00:00Z"),
            ChannelKind::News,
        )];
        let (_, rejected) = prefilter(&items, &info, FilterMode::Strict, 3);
        assert_eq!(
            rejected[0].to_string(),
            "[0] Valencia football <https://a.example/2> time=true location=true keyword=false \
             mode=strict: no rain or flood keyword"
        );
    }

    #[test]
    fn test_filter_mode_parsing() {
        assert_eq!("Strict".parse::<FilterMode>().unwrap(), FilterMode::Strict);
        assert_eq!("loose".parse::<FilterMode>().unwrap(), FilterMode::Loose);
        assert!(matches!(
            "lenient".parse::<FilterMode>(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_strict_and_loose_agree_with_checks() {
        let info = valencia();
        let items = vec![
            item("Valencia flood", "https://a.example/1", Some("2025-10-12T00:00:00Z"), ChannelKind::News),
            item("Valencia football", "https://a.example/2", Some("2025-10-12T00:00:00Z"), ChannelKind::News),
            item("Flood in Texas", "https://a.example/3", Some("2025-09-01T00:00:00Z"), ChannelKind::News),
            item("Stock markets", "https://a.example/4", Some("2024-01-01T00:00:00Z"), ChannelKind::News),
        ];
        for mode in [FilterMode::Strict, FilterMode::Loose] {
            let (kept, rejected) = prefilter(&items, &info, mode, 3);
            for candidate in &items {
                let checks = evaluate(candidate, &info, 3);
                let expected = match mode {
                    FilterMode::Strict => checks.time && checks.location && checks.keyword,
                    FilterMode::Loose => checks.time || checks.location || checks.keyword,
                };
                assert_eq!(kept.contains(candidate), expected, "{:?} {}", mode, candidate.title);
            }
            assert_eq!(kept.len() + rejected.len(), items.len());
        }

        let (strict, _) = prefilter(&items, &info, FilterMode::Strict, 3);
        assert_eq!(strict.len(), 1);
        let (loose, rejected) = prefilter(&items, &info, FilterMode::Loose, 3);
        assert_eq!(loose.len(), 3);
        assert_eq!(rejected[0].index, 3);
        assert_eq!(rejected[0].reasons.len(), 3);
        assert_eq!(rejected[0].mode, FilterMode::Loose);
    }

    #[test]
    fn test_localized_terms_match() {
        let info = valencia();
        let local = item(
            "Lluvias e inundación en Valencia",
            "https://a.example/es",
            Some("2025-10-11T09:00:00Z"),
            ChannelKind::News,
        );
        let checks = evaluate(&local, &info, 3);
        assert!(checks.keyword && checks.location && checks.time);

        let native_country = item("Riadas en España", "https://a.example/x", None, ChannelKind::News);
        assert!(evaluate(&native_country, &info, 3).location);
    }

    #[test]
    fn test_time_window_edges() {
        let info = valencia();
        let check = |published: &str| {
            evaluate(
                &item("x", "https://a.example/", Some(published), ChannelKind::News),
                &info,
                3,
            )
            .time
        };
        assert!(check("2025-10-11T00:00:00Z"), "same day counts");
        assert!(check("2025-10-14T05:00:00Z"));
        assert!(!check("2025-10-15T07:00:00Z"));
        assert!(!check("2025-10-10T23:00:00Z"));
        assert!(check("not a date"), "unparseable passes");
    }

    #[test]
    fn test_fallback_dates() {
        let from_url = item("x", "https://news.example/2025/10/12/valencia-flood/", None, ChannelKind::News);
        assert_eq!(publication_time(&from_url).map(|d| d.day()), Some(12));

        let dashed = date_from_url("https://news.example/2025-10-13/story").unwrap();
        assert_eq!(dashed.day(), 13);

        assert_eq!(date_from_text("Updated Oct 14, 2025 at noon").map(|d| d.day()), Some(14));
        assert_eq!(date_from_text("Posted October 9, 2025").map(|d| d.month()), Some(10));
        assert_eq!(date_from_text("report 2025-10-12 update").map(|d| d.day()), Some(12));
        assert_eq!(date_from_text("as of 10/29/2025").map(|d| d.day()), Some(29));
        assert!(date_from_text("no date here").is_none());

        let old_by_url = item("Valencia flood", "https://n.example/2019/10/12/a/", None, ChannelKind::News);
        assert!(!evaluate(&old_by_url, &valencia(), 3).time);
    }

    #[test]
    fn test_no_event_time_or_place() {
        let info = EventInfo {
            event_time: None,
            places: Vec::new(),
            terms: vec!["rain".to_string()],
        };
        let checks = evaluate(
            &item("Sunny day", "https://a.example/1", Some("1999-01-01"), ChannelKind::News),
            &info,
            3,
        );
        assert!(checks.time);
        assert!(checks.location);
        assert!(!checks.keyword);
    }

    #[test]
    fn test_media_priority_merge() {
        let info = valencia();
        let mut items: Vec<CollectedItem> = (0..5)
            .map(|i| {
                item(
                    "Valencia flood video",
                    &format!("https://video.example/{}", i),
                    Some("2025-10-11T12:00:00Z"),
                    ChannelKind::Media,
                )
            })
            .collect();
        items.extend((0..20).map(|i| {
            item(
                "Valencia flood news",
                &format!("https://news.example/{}", i),
                Some("2025-10-11T12:00:00Z"),
                ChannelKind::News,
            )
        }));

        let outcome = prefilter_with_priority(&items, &info, &Settings::default());
        assert_eq!(outcome.media_passed, 5);
        assert_eq!(outcome.others_passed, 20);
        assert_eq!(outcome.kept.len(), 15);
        assert_eq!(outcome.kept.iter().filter(|i| i.is_priority()).count(), 3);
        assert!(outcome.kept[..3].iter().all(|i| i.is_priority()));
    }

    #[test]
    fn test_merge_media_first_fills_with_others() {
        let merged = merge_media_first(vec!["m1"], vec!["n1", "n2", "n3"], 3, 3);
        assert_eq!(merged, vec!["m1", "n1", "n2"]);
        let merged = merge_media_first(vec!["m1", "m2"], Vec::new(), 3, 10);
        assert_eq!(merged, vec!["m1", "m2"]);
    }
}
