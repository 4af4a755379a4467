use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::info;

use crate::collectors::CollectedItem;
use crate::config::Settings;
use crate::error::Result;
use crate::json_repair::parse_object_or_empty;
use crate::llm::{ChatModel, ChatOptions};
use crate::prefilter::{self, EventInfo, PrefilterOutcome};
use crate::prompt::{validation_messages, EventBrief};
use crate::TARGET_PIPELINE;

/// A candidate the model judged relevant to the event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedItem {
    #[serde(flatten)]
    pub item: CollectedItem,
    /// Position in the candidate list sent to the model.
    pub index: usize,
    pub relevance_score: f64,
    pub reason: String,
}

impl ValidatedItem {
    pub fn is_priority(&self) -> bool {
        self.item.is_priority()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedItem {
    pub index: usize,
    pub title: String,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub relevant: Vec<ValidatedItem>,
    pub irrelevant: Vec<RejectedItem>,
}

impl ValidationResult {
    pub fn is_empty(&self) -> bool {
        self.relevant.is_empty()
    }

    pub fn relevant_items(&self) -> Vec<CollectedItem> {
        self.relevant.iter().map(|v| v.item.clone()).collect()
    }
}

/// What goes to the model, plus the pre-filter record when one ran.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    pub items: Vec<CollectedItem>,
    pub prefilter: Option<PrefilterOutcome>,
    /// Items collected before screening.
    pub collected: usize,
}

/// Screen (when enabled) and cap the collected items.
pub fn prepare_candidates(
    collected: &[CollectedItem],
    info: &EventInfo,
    settings: &Settings,
) -> Candidates {
    let (mut items, prefilter) = if settings.pre_filter_enabled {
        let outcome = prefilter::prefilter_with_priority(collected, info, settings);
        (outcome.kept.clone(), Some(outcome))
    } else {
        (collected.to_vec(), None)
    };

    if items.len() > settings.max_items_for_validation {
        info!(
            target: TARGET_PIPELINE,
            "Capping {} candidates to {} for validation",
            items.len(),
            settings.max_items_for_validation
        );
        items.truncate(settings.max_items_for_validation);
    }

    Candidates {
        items,
        prefilter,
        collected: collected.len(),
    }
}

/// Ask the model which candidates belong to the event.
///
/// No candidates means no model call. A model error propagates; an
/// unreadable response reads as "nothing relevant".
pub async fn run_validation(
    model: &dyn ChatModel,
    brief: &EventBrief,
    candidates: &[CollectedItem],
    settings: &Settings,
) -> Result<ValidationResult> {
    if candidates.is_empty() {
        info!(target: TARGET_PIPELINE, "No candidates to validate");
        return Ok(ValidationResult::default());
    }

    let messages = validation_messages(brief, candidates, settings.validation_time_window_days);
    let response = model.chat(&messages, &ChatOptions::json(settings)).await?;
    let result = interpret(&parse_object_or_empty(&response), candidates, settings);

    info!(
        target: TARGET_PIPELINE,
        "Validation: {} relevant ({} media), {} irrelevant of {} candidates",
        result.relevant.len(),
        result.relevant.iter().filter(|v| v.is_priority()).count(),
        result.irrelevant.len(),
        candidates.len()
    );
    Ok(result)
}

/// Map the model's verdicts back onto the candidates and apply the
/// media-first cap.
pub fn interpret(
    response: &Map<String, Value>,
    candidates: &[CollectedItem],
    settings: &Settings,
) -> ValidationResult {
    let mut seen = HashSet::new();
    let mut media = Vec::new();
    let mut others = Vec::new();
    for verdict in entries(response, "relevant_items") {
        let Some(index) = verdict_index(verdict, candidates.len()) else {
            continue;
        };
        if !seen.insert(index) {
            continue;
        }
        let validated = ValidatedItem {
            item: candidates[index].clone(),
            index,
            relevance_score: verdict
                .get("relevance_score")
                .and_then(score_value)
                .unwrap_or(0.0)
                .clamp(0.0, 1.0),
            reason: reason(verdict),
        };
        if validated.is_priority() {
            media.push(validated);
        } else {
            others.push(validated);
        }
    }

    let mut rejected_seen = HashSet::new();
    let irrelevant = entries(response, "irrelevant_items")
        .filter_map(|verdict| {
            let index = verdict_index(verdict, candidates.len())?;
            if seen.contains(&index) || !rejected_seen.insert(index) {
                return None;
            }
            Some(RejectedItem {
                index,
                title: candidates[index].title.clone(),
                url: candidates[index].url.clone(),
                reason: reason(verdict),
            })
        })
        .collect();

    ValidationResult {
        relevant: prefilter::merge_media_first(
            media,
            others,
            settings.validation_media_cap,
            settings.validation_total_cap,
        ),
        irrelevant,
    }
}

fn entries<'a>(
    response: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
    response
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

/// Integer or numeric-string index within `0..len`.
fn verdict_index(verdict: &Map<String, Value>, len: usize) -> Option<usize> {
    let index = match verdict.get("index")? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    usize::try_from(index).ok().filter(|i| *i < len)
}

fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn reason(verdict: &Map<String, Value>) -> String {
    verdict
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ChannelKind;
    use serde_json::json;

    fn candidate(i: usize, kind: ChannelKind) -> CollectedItem {
        let mut item = CollectedItem::new(
            "en",
            &format!("Valencia flood {}", i),
            "Heavy rain in Valencia",
            &format!("https://example.com/{}", i),
        );
        item.kind = kind;
        item.channel = match kind {
            ChannelKind::Media => "media".to_string(),
            _ => "news_thenewsapi".to_string(),
        };
        item
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_out_of_range_and_duplicate_indices_are_dropped() {
        let candidates: Vec<_> = (0..3).map(|i| candidate(i, ChannelKind::News)).collect();
        let response = object(json!({
            "relevant_items": [
                {"index": 1, "relevance_score": 0.9, "reason": "same city"},
                {"index": 1, "relevance_score": 0.4, "reason": "repeat"},
                {"index": 7, "relevance_score": 0.8, "reason": "hallucinated"},
                {"index": -1, "relevance_score": 0.8},
                {"index": "2", "relevance_score": "1.7"}
            ],
            "irrelevant_items": [
                {"index": 0, "reason": "different year"},
                {"index": 1, "reason": "contradicts relevant verdict"},
                {"index": 12, "reason": "out of range"}
            ]
        }));

        let result = interpret(&response, &candidates, &Settings::default());
        let indices: Vec<usize> = result.relevant.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(result.relevant[0].reason, "same city");
        assert_eq!(result.relevant[0].item.url, "https://example.com/1");
        assert_eq!(result.relevant[1].relevance_score, 1.0);

        assert_eq!(result.irrelevant.len(), 1);
        assert_eq!(result.irrelevant[0].index, 0);
        assert_eq!(result.irrelevant[0].title, "Valencia flood 0");
    }

    #[test]
    fn test_media_first_recap() {
        // 5 media, 13 news, all relevant
        let mut candidates: Vec<_> = (0..5).map(|i| candidate(i, ChannelKind::Media)).collect();
        candidates.extend((5..18).map(|i| candidate(i, ChannelKind::News)));
        let verdicts: Vec<Value> = (0..18)
            .rev()
            .map(|i| json!({"index": i, "relevance_score": 0.5}))
            .collect();
        let response = object(json!({ "relevant_items": verdicts }));

        let result = interpret(&response, &candidates, &Settings::default());
        assert_eq!(result.relevant.len(), 10);
        let media: Vec<_> = result.relevant.iter().filter(|v| v.is_priority()).collect();
        assert_eq!(media.len(), 3);
        assert!(result.relevant[..3].iter().all(|v| v.is_priority()));
        // Model order is kept within each group
        assert_eq!(result.relevant[0].index, 4);
        assert_eq!(result.relevant[3].index, 17);
    }

    #[test]
    fn test_empty_response_means_nothing_relevant() {
        let candidates = vec![candidate(0, ChannelKind::News)];
        let result = interpret(&Map::new(), &candidates, &Settings::default());
        assert!(result.is_empty());
        assert!(result.irrelevant.is_empty());
    }

    #[test]
    fn test_prepare_candidates_caps_after_prefilter() {
        let settings = Settings {
            pre_filter_enabled: false,
            max_items_for_validation: 4,
            ..Settings::default()
        };
        let collected: Vec<_> = (0..9).map(|i| candidate(i, ChannelKind::News)).collect();
        let info = EventInfo {
            event_time: None,
            places: Vec::new(),
            terms: Vec::new(),
        };
        let candidates = prepare_candidates(&collected, &info, &settings);
        assert_eq!(candidates.items.len(), 4);
        assert_eq!(candidates.collected, 9);
        assert!(candidates.prefilter.is_none());
    }
}
