//! Pluggable multi-source collection.
//!
//! Every provider implements [`Collector`]: it builds a request for one
//! language, dispatches it, and parses the response into [`CollectedItem`]s.
//! [`collect`] drives one channel across all languages of the plan and then
//! caps, deduplicates and recency-filters the results. A failure in one
//! language is logged and skipped; missing credentials fail the channel.

mod client;
mod media;
mod news;
mod official;
mod social;
mod types;

pub use self::client::HttpClient;
pub use self::media::YouTube;
pub use self::news::{GNews, SerpApi, TheNewsApi};
pub use self::official::Tavily;
pub use self::social::{Instagram, XRecentSearch};
pub use self::types::*;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::event::RainEvent;
use crate::query::{ChannelConfig, KeywordBundle, QueryPlan};
use crate::terminology::LocationProfile;
use crate::util::parse_datetime;
use crate::TARGET_WEB_REQUEST;

/// Read-only view of the event run handed to collectors.
#[derive(Clone, Copy)]
pub struct CollectContext<'a> {
    pub event: &'a RainEvent,
    pub profile: &'a LocationProfile,
    pub plan: &'a QueryPlan,
    pub settings: &'a Settings,
}

#[async_trait]
pub trait Collector: Send + Sync {
    /// Provider name as used in the channel table.
    fn provider(&self) -> &'static str;

    /// The credential this provider needs. Absence is a configuration error.
    fn credential<'a>(&self, settings: &'a Settings) -> Result<&'a str>;

    fn build_request(
        &self,
        ctx: &CollectContext<'_>,
        channel: &ChannelConfig,
        language: &str,
        keywords: &[String],
        query: &str,
    ) -> Result<SearchRequest>;

    async fn dispatch(&self, http: &HttpClient, request: SearchRequest) -> Result<Value> {
        http.send(request).await
    }

    fn parse(&self, response: &Value, language: &str) -> Result<Vec<CollectedItem>>;

    fn post_process(
        &self,
        items: Vec<CollectedItem>,
        channel: &ChannelConfig,
        ctx: &CollectContext<'_>,
    ) -> Vec<CollectedItem> {
        let items = cap_and_dedup(items, channel.max_results);
        match channel.kind.recency_hours(ctx.plan.lookback_hours) {
            Some(hours) => filter_by_time(items, hours, Utc::now().naive_utc()),
            None => items,
        }
    }
}

/// Missing credential helper shared by providers.
pub(crate) fn require<'a>(value: Option<&'a String>, env_var: &str) -> Result<&'a str> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PipelineError::Configuration(format!("{} is not configured", env_var)))
}

/// Run one channel: every language of the plan, then post-processing.
pub async fn collect(
    collector: &dyn Collector,
    ctx: &CollectContext<'_>,
    channel: &ChannelConfig,
    http: &HttpClient,
) -> Result<Vec<CollectedItem>> {
    if !channel.enabled {
        debug!(target: TARGET_WEB_REQUEST, "Channel {} disabled, skipping", channel.name);
        return Ok(Vec::new());
    }
    collector.credential(ctx.settings)?;

    let mut items = Vec::new();
    for bundle in &ctx.plan.bundles {
        match fetch_language(collector, ctx, channel, bundle, http).await {
            Ok(parsed) => {
                info!(
                    target: TARGET_WEB_REQUEST,
                    "[{} {}] {} items", channel.name, bundle.language, parsed.len()
                );
                items.extend(parsed.into_iter().map(|mut item| {
                    item.channel = channel.name.clone();
                    item.kind = channel.kind;
                    item
                }));
            }
            Err(e) => {
                warn!(
                    target: TARGET_WEB_REQUEST,
                    "[{} {}] request failed, skipping language: {}", channel.name, bundle.language, e
                );
            }
        }
    }

    let before = items.len();
    let items = collector.post_process(items, channel, ctx);
    debug!(
        target: TARGET_WEB_REQUEST,
        "Channel {} kept {} of {} items after post-processing",
        channel.name,
        items.len(),
        before
    );
    Ok(items)
}

async fn fetch_language(
    collector: &dyn Collector,
    ctx: &CollectContext<'_>,
    channel: &ChannelConfig,
    bundle: &KeywordBundle,
    http: &HttpClient,
) -> Result<Vec<CollectedItem>> {
    let keywords = bundle.keywords();
    if keywords.is_empty() {
        return Ok(Vec::new());
    }
    let request = collector.build_request(ctx, channel, &bundle.language, &keywords, &bundle.query)?;
    let response = collector.dispatch(http, request).await?;
    collector.parse(&response, &bundle.language)
}

/// Cap to `max_results`, then drop empty and repeated urls. First occurrence wins.
pub fn cap_and_dedup(items: Vec<CollectedItem>, max_results: usize) -> Vec<CollectedItem> {
    dedup_by_url(items.into_iter().take(max_results).collect())
}

pub fn dedup_by_url(items: Vec<CollectedItem>) -> Vec<CollectedItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| !item.url.is_empty() && seen.insert(item.url.clone()))
        .collect()
}

/// Keep items published within `hours` of `now`.
///
/// Items without a timestamp, or with one we cannot parse, are kept.
pub fn filter_by_time(items: Vec<CollectedItem>, hours: i64, now: NaiveDateTime) -> Vec<CollectedItem> {
    if hours <= 0 {
        return items;
    }
    let cutoff = now - ChronoDuration::hours(hours);
    items
        .into_iter()
        .filter(|item| {
            match item.published_at.as_deref().and_then(parse_datetime) {
                Some(published) => published >= cutoff,
                None => true,
            }
        })
        .collect()
}

static THENEWSAPI: TheNewsApi = TheNewsApi;
static GNEWS: GNews = GNews;
static SERPAPI: SerpApi = SerpApi;
static TAVILY: Tavily = Tavily;
static YOUTUBE: YouTube = YouTube;
static X_RECENT: XRecentSearch = XRecentSearch;
static INSTAGRAM: Instagram = Instagram;

/// Built-in provider table.
pub static REGISTRY: &[&(dyn Collector)] = &[
    &THENEWSAPI,
    &GNEWS,
    &SERPAPI,
    &TAVILY,
    &YOUTUBE,
    &X_RECENT,
    &INSTAGRAM,
];

/// Provider name → implementation lookup used by the orchestrator.
#[derive(Clone)]
pub struct CollectorSet {
    collectors: Vec<&'static dyn Collector>,
}

impl CollectorSet {
    pub fn builtin() -> Self {
        Self {
            collectors: REGISTRY.to_vec(),
        }
    }

    pub fn empty() -> Self {
        Self {
            collectors: Vec::new(),
        }
    }

    /// Register a collector, replacing any with the same provider name.
    pub fn with(mut self, collector: &'static dyn Collector) -> Self {
        self.collectors
            .retain(|c| c.provider() != collector.provider());
        self.collectors.push(collector);
        self
    }

    pub fn get(&self, provider: &str) -> Option<&'static dyn Collector> {
        self.collectors
            .iter()
            .copied()
            .find(|c| c.provider() == provider)
    }

    pub fn providers(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.provider()).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Fixture;
    use super::*;
    use crate::config::ApiKeys;
    use crate::query::ChannelKind;
    use chrono::NaiveDate;
    use serde_json::json;

    fn item(url: &str, published_at: Option<&str>) -> CollectedItem {
        CollectedItem::new("en", "Flood", "Heavy rain", url).published(published_at)
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let items = vec![
            item("https://a.example/1", None),
            item("https://a.example/2", None),
            item("https://a.example/1", None),
            item("", None),
        ];
        let once = dedup_by_url(items);
        let twice = dedup_by_url(once.clone());
        assert_eq!(once.len(), 2);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_cap_applies_before_dedup() {
        let items = vec![
            item("https://a.example/1", None),
            item("https://a.example/1", None),
            item("https://a.example/2", None),
        ];
        let capped = cap_and_dedup(items, 2);
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn test_filter_by_time_is_lenient() {
        let now = NaiveDate::from_ymd_opt(2025, 10, 12)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        let items = vec![
            item("https://a.example/recent", Some("2025-10-12T06:00:00Z")),
            item("https://a.example/old", Some("2025-10-01T06:00:00Z")),
            item("https://a.example/none", None),
            item("https://a.example/garbage", Some("last tuesday")),
        ];
        let kept: Vec<String> = filter_by_time(items.clone(), 48, now)
            .into_iter()
            .map(|i| i.url)
            .collect();
        assert_eq!(
            kept,
            vec![
                "https://a.example/recent",
                "https://a.example/none",
                "https://a.example/garbage"
            ]
        );
        assert_eq!(filter_by_time(items, 0, now).len(), 4);
    }

    #[test]
    fn test_registry_lookup() {
        let set = CollectorSet::builtin();
        for provider in ["tavily", "thenewsapi", "gnews", "serpapi", "youtube", "x", "instagram"] {
            assert!(set.get(provider).is_some(), "missing {}", provider);
        }
        assert!(set.get("myspace").is_none());
        assert!(CollectorSet::empty().get("tavily").is_none());
    }

    /// Answers every request with a canned body, failing for one language.
    struct Canned;

    #[async_trait]
    impl Collector for Canned {
        fn provider(&self) -> &'static str {
            "thenewsapi"
        }

        fn credential<'a>(&self, settings: &'a Settings) -> Result<&'a str> {
            require(settings.api_keys.thenewsapi.as_ref(), "THENEWSAPI_KEY")
        }

        fn build_request(
            &self,
            _ctx: &CollectContext<'_>,
            channel: &ChannelConfig,
            language: &str,
            _keywords: &[String],
            query: &str,
        ) -> Result<SearchRequest> {
            Ok(SearchRequest::get(&channel.endpoint)
                .param("language", language)
                .param("search", query))
        }

        async fn dispatch(&self, _http: &HttpClient, request: SearchRequest) -> Result<Value> {
            match request.param_value("language") {
                Some("es") => Err(PipelineError::Transport("connection reset".into())),
                _ => Ok(json!({"data": [
                    {"title": "Valencia floods", "url": "https://news.example/1"},
                    {"title": "Valencia floods again", "url": "https://news.example/1"},
                    {"title": "Storm", "url": "https://news.example/2"}
                ]})),
            }
        }

        fn parse(&self, response: &Value, language: &str) -> Result<Vec<CollectedItem>> {
            TheNewsApi.parse(response, language)
        }
    }

    #[tokio::test]
    async fn test_collect_survives_language_failure() {
        let settings = Settings {
            api_keys: ApiKeys {
                thenewsapi: Some("key".to_string()),
                ..ApiKeys::default()
            },
            ..Settings::default()
        };
        let fixture = Fixture::valencia(settings);
        let channel = fixture.channel("news_thenewsapi");
        let http = HttpClient::new(DEFAULT_REQUEST_TIMEOUT).unwrap();

        let items = collect(&Canned, &fixture.ctx(), &channel, &http).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.channel == "news_thenewsapi"));
        assert!(items.iter().all(|i| i.kind == ChannelKind::News));
        assert!(items.iter().all(|i| i.language == "en"));
    }

    #[tokio::test]
    async fn test_collect_missing_credential_is_configuration_error() {
        let fixture = Fixture::valencia(Settings::default());
        let channel = fixture.channel("news_thenewsapi");
        let http = HttpClient::new(DEFAULT_REQUEST_TIMEOUT).unwrap();

        let result = collect(&Canned, &fixture.ctx(), &channel, &http).await;
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_collect_skips_disabled_channel() {
        let fixture = Fixture::valencia(Settings::default());
        let mut channel = fixture.channel("news_thenewsapi");
        channel.enabled = false;
        let http = HttpClient::new(DEFAULT_REQUEST_TIMEOUT).unwrap();

        let items = collect(&Canned, &fixture.ctx(), &channel, &http).await.unwrap();
        assert!(items.is_empty());
    }
}
