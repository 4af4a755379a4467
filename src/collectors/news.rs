//! News aggregator collectors: TheNewsAPI, GNews and SerpAPI (Google News).

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde_json::Value;

use super::types::{str_field, str_or_empty, CollectedItem, SearchRequest};
use super::{require, CollectContext, Collector};
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::query::ChannelConfig;

/// Event day and the end of the search window, when the event time is known.
pub(crate) fn search_window(ctx: &CollectContext<'_>) -> Option<(NaiveDate, NaiveDate)> {
    let start = ctx.event.event_time?.date();
    let end = start + ChronoDuration::days(ctx.plan.news_window_days + 1);
    Some((start, end))
}

fn array<'a>(response: &'a Value, key: &str, provider: &str) -> Result<&'a Vec<Value>> {
    match response.get(key) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) | None => Err(PipelineError::Parse(format!(
            "{} response has no '{}' array",
            provider, key
        ))),
        Some(_) => Err(PipelineError::Parse(format!(
            "{} response field '{}' is not an array",
            provider, key
        ))),
    }
}

pub struct TheNewsApi;

#[async_trait]
impl Collector for TheNewsApi {
    fn provider(&self) -> &'static str {
        "thenewsapi"
    }

    fn credential<'a>(&self, settings: &'a Settings) -> Result<&'a str> {
        require(settings.api_keys.thenewsapi.as_ref(), "THENEWSAPI_KEY")
    }

    fn build_request(
        &self,
        ctx: &CollectContext<'_>,
        channel: &ChannelConfig,
        language: &str,
        _keywords: &[String],
        query: &str,
    ) -> Result<SearchRequest> {
        let token = self.credential(ctx.settings)?;
        let mut request = SearchRequest::get(&channel.endpoint)
            .param("api_token", token)
            .param("search", query)
            .param("language", language)
            .param("limit", channel.max_results.min(50));
        if let Some(code) = &ctx.profile.country_code {
            request = request.param("locale", code.to_lowercase());
        }
        if let Some((start, end)) = search_window(ctx) {
            request = request
                .param("published_after", start.format("%Y-%m-%d"))
                .param("published_before", end.format("%Y-%m-%d"));
        }
        Ok(request)
    }

    fn parse(&self, response: &Value, language: &str) -> Result<Vec<CollectedItem>> {
        Ok(array(response, "data", "TheNewsAPI")?
            .iter()
            .map(|article| {
                CollectedItem::new(
                    language,
                    str_or_empty(article, "title"),
                    str_field(article, "description")
                        .or_else(|| str_field(article, "snippet"))
                        .unwrap_or(""),
                    str_or_empty(article, "url"),
                )
                .published(str_field(article, "published_at"))
                .source(str_field(article, "source"))
            })
            .collect())
    }
}

pub struct GNews;

#[async_trait]
impl Collector for GNews {
    fn provider(&self) -> &'static str {
        "gnews"
    }

    fn credential<'a>(&self, settings: &'a Settings) -> Result<&'a str> {
        require(settings.api_keys.gnews.as_ref(), "GNEWS_API_KEY")
    }

    fn build_request(
        &self,
        ctx: &CollectContext<'_>,
        channel: &ChannelConfig,
        language: &str,
        _keywords: &[String],
        query: &str,
    ) -> Result<SearchRequest> {
        let token = self.credential(ctx.settings)?;
        let mut request = SearchRequest::get(&channel.endpoint)
            .param("q", query)
            .param("token", token)
            .param("lang", language)
            .param("max", channel.max_results.min(10));
        if let Some((start, end)) = search_window(ctx) {
            request = request
                .param("from", format!("{}T00:00:00Z", start.format("%Y-%m-%d")))
                .param("to", format!("{}T00:00:00Z", end.format("%Y-%m-%d")));
        }
        Ok(request)
    }

    fn parse(&self, response: &Value, language: &str) -> Result<Vec<CollectedItem>> {
        Ok(array(response, "articles", "GNews")?
            .iter()
            .map(|article| {
                let source = article
                    .get("source")
                    .and_then(|s| str_field(s, "name"));
                CollectedItem::new(
                    language,
                    str_or_empty(article, "title"),
                    str_field(article, "description")
                        .or_else(|| str_field(article, "content"))
                        .unwrap_or(""),
                    str_or_empty(article, "url"),
                )
                .published(str_field(article, "publishedAt"))
                .source(source)
            })
            .collect())
    }
}

pub struct SerpApi;

#[async_trait]
impl Collector for SerpApi {
    fn provider(&self) -> &'static str {
        "serpapi"
    }

    fn credential<'a>(&self, settings: &'a Settings) -> Result<&'a str> {
        require(settings.api_keys.serpapi.as_ref(), "SERPAPI_KEY")
    }

    fn build_request(
        &self,
        ctx: &CollectContext<'_>,
        channel: &ChannelConfig,
        language: &str,
        _keywords: &[String],
        query: &str,
    ) -> Result<SearchRequest> {
        let key = self.credential(ctx.settings)?;
        Ok(SearchRequest::get(&channel.endpoint)
            .param("engine", "google_news")
            .param("q", query)
            .param("gl", "us")
            .param("hl", language)
            .param("api_key", key)
            .param("num", channel.max_results))
    }

    fn parse(&self, response: &Value, language: &str) -> Result<Vec<CollectedItem>> {
        let results = array(response, "news_results", "SerpAPI")
            .or_else(|_| array(response, "articles", "SerpAPI"))?;
        Ok(results
            .iter()
            .map(|article| {
                // source is either a plain string or {"name": ...}
                let source = match article.get("source") {
                    Some(Value::String(s)) => Some(s.as_str()),
                    Some(obj @ Value::Object(_)) => str_field(obj, "name"),
                    _ => None,
                };
                CollectedItem::new(
                    language,
                    str_or_empty(article, "title"),
                    str_or_empty(article, "snippet"),
                    str_field(article, "link")
                        .or_else(|| str_field(article, "url"))
                        .unwrap_or(""),
                )
                .published(str_field(article, "date"))
                .source(source)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::Fixture;
    use crate::config::ApiKeys;
    use serde_json::json;

    fn settings_with_keys() -> Settings {
        Settings {
            api_keys: ApiKeys {
                thenewsapi: Some("tn-key".to_string()),
                gnews: Some("gn-key".to_string()),
                serpapi: Some("sp-key".to_string()),
                ..ApiKeys::default()
            },
            ..Settings::default()
        }
    }

    #[test]
    fn test_thenewsapi_request() {
        let fixture = Fixture::valencia(settings_with_keys());
        let channel = fixture.channel("news_thenewsapi");
        let request = TheNewsApi
            .build_request(&fixture.ctx(), &channel, "es", &[], "Valencia España lluvia")
            .unwrap();
        assert_eq!(request.param_value("api_token"), Some("tn-key"));
        assert_eq!(request.param_value("limit"), Some("50"));
        assert_eq!(request.param_value("locale"), Some("es"));
        assert_eq!(request.param_value("published_after"), Some("2025-10-11"));
        // window of 3 days plus the event day
        assert_eq!(request.param_value("published_before"), Some("2025-10-15"));
    }

    #[test]
    fn test_thenewsapi_parse() {
        let response = json!({"data": [{
            "title": "Riadas en Valencia",
            "description": "Lluvias torrenciales",
            "url": "https://elpais.example/a",
            "published_at": "2025-10-11T09:00:00.000000Z",
            "source": "elpais.com"
        }]});
        let items = TheNewsApi.parse(&response, "es").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].summary, "Lluvias torrenciales");
        assert_eq!(items[0].source.as_deref(), Some("elpais.com"));
        assert_eq!(items[0].language, "es");
    }

    #[test]
    fn test_missing_array_is_parse_error() {
        let err = TheNewsApi.parse(&json!({"error": "quota"}), "en").unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn test_gnews_request_caps_max() {
        let fixture = Fixture::valencia(settings_with_keys());
        let mut channel = fixture.channel("news_gnews");
        channel.max_results = 40;
        let request = GNews
            .build_request(&fixture.ctx(), &channel, "en", &[], "Valencia flood")
            .unwrap();
        assert_eq!(request.param_value("max"), Some("10"));
        assert_eq!(request.param_value("from"), Some("2025-10-11T00:00:00Z"));
    }

    #[test]
    fn test_gnews_parse_nested_source() {
        let response = json!({"articles": [{
            "title": "Floods hit Valencia",
            "description": "Roads closed",
            "url": "https://news.example/g",
            "publishedAt": "2025-10-11T10:00:00Z",
            "source": {"name": "Example News"}
        }]});
        let items = GNews.parse(&response, "en").unwrap();
        assert_eq!(items[0].source.as_deref(), Some("Example News"));
        assert_eq!(items[0].published_at.as_deref(), Some("2025-10-11T10:00:00Z"));
    }

    #[test]
    fn test_serpapi_parse_either_shape() {
        let news_results = json!({"news_results": [{
            "title": "A", "link": "https://s.example/1", "snippet": "s",
            "source": {"name": "Outlet"}, "date": "10/11/2025"
        }]});
        let articles = json!({"articles": [{
            "title": "B", "link": "https://s.example/2", "source": "Plain"
        }]});
        assert_eq!(
            SerpApi.parse(&news_results, "en").unwrap()[0].source.as_deref(),
            Some("Outlet")
        );
        assert_eq!(
            SerpApi.parse(&articles, "en").unwrap()[0].source.as_deref(),
            Some("Plain")
        );
    }

    #[test]
    fn test_missing_key_fails_build() {
        let fixture = Fixture::valencia(Settings::default());
        let channel = fixture.channel("news_serpapi");
        let err = SerpApi
            .build_request(&fixture.ctx(), &channel, "en", &[], "q")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
