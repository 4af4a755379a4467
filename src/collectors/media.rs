//! Video search through the YouTube Data API.

use async_trait::async_trait;
use serde_json::Value;

use super::news::search_window;
use super::types::{str_field, str_or_empty, CollectedItem, SearchRequest};
use super::{require, CollectContext, Collector};
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::query::ChannelConfig;

pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

pub struct YouTube;

#[async_trait]
impl Collector for YouTube {
    fn provider(&self) -> &'static str {
        "youtube"
    }

    fn credential<'a>(&self, settings: &'a Settings) -> Result<&'a str> {
        require(settings.api_keys.youtube.as_ref(), "YOUTUBE_API_KEY")
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
        let mut request = SearchRequest::get(&channel.endpoint)
            .param("part", "snippet")
            .param("q", query)
            .param("type", "video")
            .param("order", "date")
            .param("maxResults", channel.max_results.min(50))
            .param("key", key)
            .param("relevanceLanguage", language);
        if let Some((start, end)) = search_window(ctx) {
            request = request
                .param("publishedAfter", format!("{}T00:00:00Z", start.format("%Y-%m-%d")))
                .param("publishedBefore", format!("{}T00:00:00Z", end.format("%Y-%m-%d")));
        }
        Ok(request)
    }

    fn parse(&self, response: &Value, language: &str) -> Result<Vec<CollectedItem>> {
        let items = response
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| PipelineError::Parse("YouTube response has no 'items' array".into()))?;

        Ok(items
            .iter()
            .filter_map(|item| {
                let video_id = item.get("id").and_then(|id| str_field(id, "videoId"))?;
                let snippet = item.get("snippet")?;
                Some(
                    CollectedItem::new(
                        language,
                        str_or_empty(snippet, "title"),
                        str_or_empty(snippet, "description"),
                        &format!("{}{}", WATCH_URL, video_id),
                    )
                    .published(str_field(snippet, "publishedAt"))
                    .source(str_field(snippet, "channelTitle")),
                )
            })
            .collect())
    }
}
