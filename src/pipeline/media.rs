use std::cmp::Ordering;
use std::collections::HashSet;

use super::validation::ValidatedItem;
use crate::prompt::{SourceRecord, SourceType};

pub const MEDIA_LIMIT: usize = 10;

/// Relevant media/social items. Past `limit`, the best-scored win; ties keep
/// validation order.
pub fn select_media(relevant: &[ValidatedItem], limit: usize) -> Vec<ValidatedItem> {
    let mut media: Vec<ValidatedItem> = relevant.iter().filter(|v| v.is_priority()).cloned().collect();
    if media.len() > limit {
        media.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
        });
        media.truncate(limit);
    }
    media
}

/// Citable sources for the report: relevant news first, then the selected
/// media. Items without a url are skipped; a url appears once.
pub fn build_sources(relevant: &[ValidatedItem], media: &[ValidatedItem]) -> Vec<SourceRecord> {
    let news = relevant
        .iter()
        .filter(|v| !v.is_priority())
        .map(|v| (SourceType::News, v));
    let visual = media.iter().map(|v| (SourceType::Media, v));

    let mut seen = HashSet::new();
    news.chain(visual)
        .filter(|(_, v)| !v.item.url.is_empty() && seen.insert(v.item.url.clone()))
        .map(|(source_type, v)| SourceRecord {
            source_type,
            title: v.item.title.clone(),
            url: v.item.url.clone(),
            summary: v.item.summary.clone(),
            source: v.item.source.clone(),
            published_at: v.item.published_at.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::CollectedItem;
    use crate::query::ChannelKind;

    fn validated(url: &str, kind: ChannelKind, score: f64) -> ValidatedItem {
        let mut item = CollectedItem::new("en", "Flood video", "", url);
        item.kind = kind;
        ValidatedItem {
            item,
            index: 0,
            relevance_score: score,
            reason: String::new(),
        }
    }

    #[test]
    fn test_select_media_keeps_top_scores() {
        let mut relevant: Vec<_> = (0..12)
            .map(|i| validated(&format!("https://v.example/{}", i), ChannelKind::Media, i as f64 / 20.0))
            .collect();
        relevant.push(validated("https://news.example/1", ChannelKind::News, 1.0));

        let media = select_media(&relevant, MEDIA_LIMIT);
        assert_eq!(media.len(), 10);
        assert_eq!(media[0].item.url, "https://v.example/11");
        assert!(media.iter().all(|m| m.is_priority()));
        assert!(!media.iter().any(|m| m.item.url == "https://v.example/0"));

        // Under the limit the order is untouched
        let few = select_media(&relevant[..3], MEDIA_LIMIT);
        assert_eq!(few[0].item.url, "https://v.example/0");
    }

    #[test]
    fn test_sources_are_typed_and_unique() {
        let relevant = vec![
            validated("https://news.example/1", ChannelKind::News, 0.9),
            validated("https://news.example/1", ChannelKind::Official, 0.7),
            validated("", ChannelKind::News, 0.6),
            validated("https://v.example/1", ChannelKind::Social, 0.8),
        ];
        let media = select_media(&relevant, MEDIA_LIMIT);
        let sources = build_sources(&relevant, &media);

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source_type, SourceType::News);
        assert_eq!(sources[1].source_type, SourceType::Media);
        assert_eq!(sources[1].url, "https://v.example/1");
    }
}
