use super::common::{or_na, EventBrief, JSON_ONLY};
use crate::collectors::CollectedItem;
use crate::llm::ChatMessage;
use crate::util::truncate_chars;

const SUMMARY_CHARS: usize = 200;

const SYSTEM: &str = "You are an information validation expert. You compare reports from many \
sources against one specific weather event and decide, item by item, whether they describe it. \
Keep answers short and focused on relevance.";

/// Short listing used for relevance judgement: title, date, 200-char summary, channel.
pub fn candidate_listing(items: &[CollectedItem]) -> String {
    let mut out = String::new();
    for (idx, item) in items.iter().enumerate() {
        out.push_str(&format!(
            "\n[{idx}] {title}\n    Published: {published}\n    Summary: {summary}\n    Channel: {channel}\n",
            idx = idx,
            title = or_na(Some(&item.title)),
            published = or_na(item.published_at.as_deref()),
            summary = or_na(Some(truncate_chars(&item.summary, SUMMARY_CHARS))),
            channel = or_na(Some(&item.channel)),
        ));
    }
    out
}

pub fn validation_messages(
    brief: &EventBrief,
    items: &[CollectedItem],
    time_window_days: i64,
) -> Vec<ChatMessage> {
    let prompt = format!(
        r#"Decide which of the search results below report on this rainfall event.

## EVENT
- Time: {time}
- Place: {place}
- Local words: "{rain}" (rain), "{flood}" (flood)

## SEARCH RESULTS
{listing}

## HOW TO JUDGE
An item is relevant when all of these hold:
* it was published between the event time and {window} days afterwards
* it concerns the same province or country
* it is about the rain, flooding or the damage they caused

For every relevant item give a relevance_score between 0.0 and 1.0 (higher means a closer match)
and a one-line reason. List relevant items from the highest score down and keep at most 10.
Items from the "media" or "social" channels carry footage of the event: prefer up to 3 of them
when they are relevant at all. For every other item give a one-line reason it was rejected.

## RESPONSE SHAPE
{{
  "relevant_items": [
    {{"index": 0, "relevance_score": 0.93, "reason": "Same day, names the province, describes street flooding"}}
  ],
  "irrelevant_items": [
    {{"index": 4, "reason": "Published two weeks after the event"}}
  ]
}}
{json_only}"#,
        time = or_na(Some(&brief.event_time)),
        place = brief.place(),
        rain = brief.rain_term,
        flood = brief.flood_term,
        listing = candidate_listing(items),
        window = time_window_days,
        json_only = JSON_ONLY,
    );
    vec![ChatMessage::system(SYSTEM), ChatMessage::user(prompt)]
}
