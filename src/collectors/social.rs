//! Social platform collectors: X recent search and Instagram hashtags.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use super::types::{str_field, str_or_empty, CollectedItem, SearchRequest};
use super::{require, CollectContext, Collector};
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::query::ChannelConfig;
use crate::util::truncate_chars;

const X_STATUS_URL: &str = "https://twitter.com/i/web/status/";
const INSTAGRAM_TAG_URL: &str = "https://www.instagram.com/explore/tags/";
// X rejects queries longer than this on the recent-search tier
const X_MAX_QUERY_LEN: usize = 512;

pub struct XRecentSearch;

/// `"term one" OR "term two"`, truncated at a whole term to fit the query limit.
fn or_query(keywords: &[String]) -> String {
    let mut query = String::new();
    for keyword in keywords {
        let quoted = format!("\"{}\"", keyword.replace('"', ""));
        let candidate = if query.is_empty() {
            quoted
        } else {
            format!("{} OR {}", query, quoted)
        };
        if candidate.chars().count() > X_MAX_QUERY_LEN {
            break;
        }
        query = candidate;
    }
    query
}

#[async_trait]
impl Collector for XRecentSearch {
    fn provider(&self) -> &'static str {
        "x"
    }

    fn credential<'a>(&self, settings: &'a Settings) -> Result<&'a str> {
        require(settings.api_keys.x_bearer.as_ref(), "X_BEARER_TOKEN")
    }

    fn build_request(
        &self,
        ctx: &CollectContext<'_>,
        channel: &ChannelConfig,
        _language: &str,
        keywords: &[String],
        _query: &str,
    ) -> Result<SearchRequest> {
        let token = self.credential(ctx.settings)?;
        Ok(SearchRequest::get(format!(
            "{}/tweets/search/recent",
            channel.endpoint.trim_end_matches('/')
        ))
        .bearer(token)
        .param("query", or_query(keywords))
        .param("max_results", channel.max_results.clamp(10, 100))
        .param("sort_order", "recency")
        .param("tweet.fields", "created_at,public_metrics,lang"))
    }

    fn parse(&self, response: &Value, language: &str) -> Result<Vec<CollectedItem>> {
        // No "data" key means no matches
        let Some(tweets) = response.get("data") else {
            return Ok(Vec::new());
        };
        let tweets = tweets
            .as_array()
            .ok_or_else(|| PipelineError::Parse("X response 'data' is not an array".into()))?;

        Ok(tweets
            .iter()
            .filter_map(|tweet| {
                let id = str_field(tweet, "id")?;
                let text = str_or_empty(tweet, "text");
                let mut item = CollectedItem::new(
                    str_field(tweet, "lang").unwrap_or(language),
                    truncate_chars(text, 100),
                    text,
                    &format!("{}{}", X_STATUS_URL, id),
                )
                .published(str_field(tweet, "created_at"))
                .source(Some("X"));
                item.engagement = engagement(tweet.get("public_metrics"));
                Some(item)
            })
            .collect())
    }
}

fn engagement(metrics: Option<&Value>) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    let Some(metrics) = metrics else {
        return out;
    };
    for (field, label) in [
        ("retweet_count", "retweets"),
        ("reply_count", "replies"),
        ("like_count", "likes"),
        ("quote_count", "quotes"),
    ] {
        if let Some(n) = metrics.get(field).and_then(Value::as_u64) {
            out.insert(label.to_string(), n);
        }
    }
    out
}

pub struct Instagram;

#[async_trait]
impl Collector for Instagram {
    fn provider(&self) -> &'static str {
        "instagram"
    }

    fn credential<'a>(&self, settings: &'a Settings) -> Result<&'a str> {
        require(settings.api_keys.instagram.as_ref(), "INSTAGRAM_ACCESS_TOKEN")
    }

    fn build_request(
        &self,
        ctx: &CollectContext<'_>,
        channel: &ChannelConfig,
        _language: &str,
        keywords: &[String],
        _query: &str,
    ) -> Result<SearchRequest> {
        let token = self.credential(ctx.settings)?;
        // Hashtag search takes a single word
        let hashtag: String = keywords
            .first()
            .and_then(|k| k.split_whitespace().next())
            .unwrap_or("")
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        if hashtag.is_empty() {
            return Err(PipelineError::Configuration(
                "no keyword usable as an Instagram hashtag".into(),
            ));
        }
        Ok(SearchRequest::get(format!(
            "{}/ig_hashtag_search",
            channel.endpoint.trim_end_matches('/')
        ))
        .param("q", hashtag)
        .param("access_token", token))
    }

    fn parse(&self, response: &Value, language: &str) -> Result<Vec<CollectedItem>> {
        let tags = response
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| PipelineError::Parse("Instagram response has no 'data' array".into()))?;
        Ok(tags
            .iter()
            .filter_map(|tag| {
                let name = str_field(tag, "name").filter(|n| !n.is_empty())?;
                Some(
                    CollectedItem::new(
                        language,
                        &format!("#{}", name),
                        &format!("Hashtag: {}", name),
                        &format!("{}{}/", INSTAGRAM_TAG_URL, name),
                    )
                    .source(Some("Instagram")),
                )
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

    fn social_settings() -> Settings {
        Settings {
            api_keys: ApiKeys {
                x_bearer: Some("bearer".to_string()),
                instagram: Some("ig".to_string()),
                ..ApiKeys::default()
            },
            ..Settings::default()
        }
    }

    #[test]
    fn test_or_query() {
        let keywords = vec!["Valencia".to_string(), "rain \"storm\"".to_string()];
        assert_eq!(or_query(&keywords), "\"Valencia\" OR \"rain storm\"");

        let long: Vec<String> = (0..200).map(|i| format!("term{}", i)).collect();
        assert!(or_query(&long).chars().count() <= X_MAX_QUERY_LEN);
    }

    #[test]
    fn test_x_request() {
        let fixture = Fixture::valencia(social_settings());
        let channel = fixture.channel("social");
        let keywords = vec!["Valencia".to_string(), "flood".to_string()];
        let request = XRecentSearch
            .build_request(&fixture.ctx(), &channel, "en", &keywords, "")
            .unwrap();
        assert_eq!(request.url, "https://api.twitter.com/2/tweets/search/recent");
        assert_eq!(request.bearer.as_deref(), Some("bearer"));
        assert_eq!(request.param_value("max_results"), Some("20"));
        assert_eq!(request.param_value("query"), Some("\"Valencia\" OR \"flood\""));
    }

    #[test]
    fn test_x_parse_engagement() {
        let response = json!({"data": [{
            "id": "1850000000000000000",
            "text": "Calles inundadas en Valencia",
            "created_at": "2025-10-11T08:00:00.000Z",
            "lang": "es",
            "public_metrics": {"retweet_count": 5, "reply_count": 2, "like_count": 40, "quote_count": 1}
        }]});
        let items = XRecentSearch.parse(&response, "en").unwrap();
        assert_eq!(items[0].url, "https://twitter.com/i/web/status/1850000000000000000");
        assert_eq!(items[0].language, "es");
        assert_eq!(items[0].engagement.get("likes"), Some(&40));
        assert_eq!(items[0].engagement.len(), 4);

        assert!(XRecentSearch.parse(&json!({"meta": {"result_count": 0}}), "en")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_instagram_request_and_parse() {
        let fixture = Fixture::valencia(social_settings());
        let channel = fixture.channel("social_instagram");
        let keywords = vec!["Valencia España".to_string()];
        let request = Instagram
            .build_request(&fixture.ctx(), &channel, "es", &keywords, "")
            .unwrap();
        assert_eq!(request.param_value("q"), Some("Valencia"));
        assert!(request.url.ends_with("/ig_hashtag_search"));

        let items = Instagram
            .parse(&json!({"data": [{"id": "1", "name": "valencia"}, {"id": "2"}]}), "es")
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "#valencia");
        assert_eq!(items[0].url, "https://www.instagram.com/explore/tags/valencia/");
    }
}
