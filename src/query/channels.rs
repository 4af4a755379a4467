//! Static channel table: which provider backs each channel, where it lives,
//! and how many results it may contribute.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    News,
    Official,
    Media,
    Social,
}

impl ChannelKind {
    /// Media and social channels carry visual evidence and get priority slots.
    pub fn is_priority(self) -> bool {
        matches!(self, ChannelKind::Media | ChannelKind::Social)
    }

    /// Recency window applied after collection, if any.
    pub fn recency_hours(self, lookback_hours: i64) -> Option<i64> {
        match self {
            ChannelKind::Media => Some(lookback_hours + 24),
            ChannelKind::Official | ChannelKind::Social => Some(lookback_hours),
            ChannelKind::News => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelConfig {
    pub name: String,
    pub provider: String,
    pub endpoint: String,
    pub max_results: usize,
    pub enabled: bool,
    pub kind: ChannelKind,
}

const CHANNEL_TABLE: &[(&str, &str, &str, usize, bool, ChannelKind)] = &[
    (
        "official",
        "tavily",
        "https://api.tavily.com/search",
        8,
        true,
        ChannelKind::Official,
    ),
    (
        "news_thenewsapi",
        "thenewsapi",
        "https://api.thenewsapi.com/v1/news/all",
        50,
        true,
        ChannelKind::News,
    ),
    (
        "news_gnews",
        "gnews",
        "https://gnews.io/api/v4/search",
        10,
        false,
        ChannelKind::News,
    ),
    (
        "news_serpapi",
        "serpapi",
        "https://serpapi.com/search",
        15,
        false,
        ChannelKind::News,
    ),
    (
        "media",
        "youtube",
        "https://www.googleapis.com/youtube/v3/search",
        12,
        true,
        ChannelKind::Media,
    ),
    (
        "social",
        "x",
        "https://api.twitter.com/2",
        20,
        false,
        ChannelKind::Social,
    ),
    (
        "social_instagram",
        "instagram",
        "https://graph.facebook.com/v21.0",
        25,
        false,
        ChannelKind::Social,
    ),
];

/// The channel table with enabled flags adjusted by `ENABLED_CHANNELS`.
pub fn default_channels(settings: &Settings) -> Vec<ChannelConfig> {
    let overridden = !settings.enabled_channels.is_empty();
    if overridden {
        for name in &settings.enabled_channels {
            if !CHANNEL_TABLE.iter().any(|(n, ..)| *n == name.as_str()) {
                warn!("ENABLED_CHANNELS names unknown channel '{}'", name);
            }
        }
    }

    CHANNEL_TABLE
        .iter()
        .map(|(name, provider, endpoint, max_results, enabled, kind)| ChannelConfig {
            name: name.to_string(),
            provider: provider.to_string(),
            endpoint: endpoint.to_string(),
            max_results: *max_results,
            enabled: if overridden {
                settings.enabled_channels.iter().any(|n| n.as_str() == *name)
            } else {
                *enabled
            },
            kind: *kind,
        })
        .collect()
}
