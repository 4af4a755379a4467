//! Type definitions for the collectors module.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::time::Duration;

use crate::query::ChannelKind;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const USER_AGENT: &str = concat!("rainscout/", env!("CARGO_PKG_VERSION"));

/// One normalized search hit. Unique by url within a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedItem {
    pub channel: String,
    pub kind: ChannelKind,
    pub language: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub published_at: Option<String>,
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub engagement: BTreeMap<String, u64>,
}

impl CollectedItem {
    /// Parsers build items without channel information; the framework stamps it.
    pub fn new(language: &str, title: &str, summary: &str, url: &str) -> Self {
        Self {
            channel: String::new(),
            kind: ChannelKind::News,
            language: language.to_string(),
            title: title.trim().to_string(),
            summary: summary.trim().to_string(),
            url: url.trim().to_string(),
            published_at: None,
            source: None,
            engagement: BTreeMap::new(),
        }
    }

    pub fn published(mut self, published_at: Option<&str>) -> Self {
        self.published_at = published_at
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self
    }

    pub fn source(mut self, source: Option<&str>) -> Self {
        self.source = source
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self
    }

    pub fn is_priority(&self) -> bool {
        self.kind.is_priority()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Provider-specific request, built by a collector and sent by the shared client.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl SearchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            bearer: None,
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            body: Some(body),
            ..Self::get(url)
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl ToString) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Small accessors for provider JSON.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

pub(crate) fn str_or_empty<'a>(value: &'a Value, key: &str) -> &'a str {
    str_field(value, key).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_builder_trims() {
        let item = CollectedItem::new("en", "  Title ", " body ", " https://a.example/x ")
            .published(Some("  "))
            .source(Some("Example"));
        assert_eq!(item.title, "Title");
        assert_eq!(item.url, "https://a.example/x");
        assert_eq!(item.published_at, None);
        assert_eq!(item.source.as_deref(), Some("Example"));
    }

    #[test]
    fn test_request_builder() {
        let request = SearchRequest::post_json("https://api.example/search", json!({"q": 1}))
            .param("limit", 5)
            .header("x-api-key", "k");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.param_value("limit"), Some("5"));
        assert_eq!(request.headers.len(), 1);
    }
}
