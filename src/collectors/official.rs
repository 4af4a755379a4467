//! Official-source search through Tavily.

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use super::types::{str_field, str_or_empty, CollectedItem, SearchRequest};
use super::{require, CollectContext, Collector};
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::query::ChannelConfig;

pub struct Tavily;

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

#[async_trait]
impl Collector for Tavily {
    fn provider(&self) -> &'static str {
        "tavily"
    }

    fn credential<'a>(&self, settings: &'a Settings) -> Result<&'a str> {
        require(settings.api_keys.tavily.as_ref(), "TAVILY_API_KEY")
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
        let body = json!({
            "query": query,
            "search_depth": "advanced",
            "include_domains": [],
            "language": language,
            "max_results": channel.max_results,
        });
        Ok(SearchRequest::post_json(&channel.endpoint, body).header("x-api-key", key))
    }

    fn parse(&self, response: &Value, language: &str) -> Result<Vec<CollectedItem>> {
        let results = response
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| PipelineError::Parse("Tavily response has no 'results' array".into()))?;
        Ok(results
            .iter()
            .map(|result| {
                let url = str_or_empty(result, "url");
                let source = str_field(result, "site_name")
                    .map(str::to_string)
                    .or_else(|| host_of(url));
                CollectedItem::new(
                    language,
                    str_or_empty(result, "title"),
                    str_or_empty(result, "content"),
                    url,
                )
                .published(str_field(result, "published_date"))
                .source(source.as_deref())
            })
            .collect())
    }
}
