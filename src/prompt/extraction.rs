use super::common::{or_na, EventBrief, JSON_ONLY};
use crate::collectors::CollectedItem;
use crate::llm::ChatMessage;

const SYSTEM: &str = "You are a disaster information extraction expert. You pull figures and \
descriptions out of unstructured reports, infer severity from wording when no figure is given, \
and leave a category empty rather than guess.";

/// Full listing for extraction; summaries are not truncated and urls are included.
pub fn source_listing(items: &[CollectedItem]) -> String {
    let mut out = String::new();
    for (idx, item) in items.iter().enumerate() {
        out.push_str(&format!(
            "\n[{}] {}\n    Published: {}\n    Summary: {}\n",
            idx,
            or_na(Some(&item.title)),
            or_na(item.published_at.as_deref()),
            or_na(Some(&item.summary)),
        ));
        if !item.url.is_empty() {
            out.push_str(&format!("    URL: {}\n", item.url));
        }
    }
    out
}

pub fn extraction_messages(brief: &EventBrief, items: &[CollectedItem]) -> Vec<ChatMessage> {
    let prompt = format!(
        r#"Build a timeline and an impact assessment for this rainfall event from the verified sources below.

## EVENT
- Time: {time}
- Place: {place}
- Rainfall: {rainfall}mm

## VERIFIED SOURCES
{listing}

## TIMELINE
* Collect every time reference, including vague ones such as "overnight" or "by the afternoon".
* Group events into slots written as "YYYY-MM-DD HH:MM-HH:MM", or "YYYY-MM-DD" when the hour is unknown.
* For each slot give the events, a one-line highlight and the source indices as "index<N>".

## IMPACT
Work through transport, economy, safety and response. For each category use the best evidence available:
1. Figures stated in the sources.
   - transport: closed_roads, bridges_damaged (integers)
   - economy: estimated_loss (text with its unit, e.g. "50 million EUR")
   - safety: injured, deaths, evacuated, houses_damaged, houses_destroyed (integers)
2. Without figures, a short description plus severity_inference, one of
   very_low, low, moderate, high, extreme, judged from the wording
   ("massive", "extensive" read as high; "several", "some" as moderate or low; "no casualties" as very_low).
3. When the sources never mention the category, set its quantitative_data to null.
A field the sources do not mention is null, never 0 and never an empty string.
Rate confidence as high (explicit figures or official sources), medium (clear description) or low (vague or conflicting).
Write everything in English.

## RESPONSE SHAPE
{{
  "timeline": [
    {{"time_slot": "2025-10-11 06:00-09:00", "events": ["Red warning issued"], "highlights": "Warning raised as rain intensified", "references": ["index0"]}}
  ],
  "impact": {{
    "transport": {{"summary": "...", "details": ["..."],
      "quantitative_data": {{"closed_roads": 12, "bridges_damaged": null, "description": "...", "severity_inference": "high", "source": "index0", "confidence": "high"}}}},
    "economy": {{"summary": "...",
      "quantitative_data": {{"estimated_loss": null, "description": "...", "severity_inference": "moderate", "source": "index1", "confidence": "medium"}}}},
    "safety": {{"summary": "...",
      "quantitative_data": {{"injured": 0, "deaths": 0, "evacuated": 300, "houses_damaged": null, "description": "...", "severity_inference": "low", "source": "index2", "confidence": "high"}}}},
    "response": {{"summary": "...", "details": ["..."]}}
  }}
}}
{json_only}"#,
        time = or_na(Some(&brief.event_time)),
        place = brief.place(),
        rainfall = brief.rainfall_mm,
        listing = source_listing(items),
        json_only = JSON_ONLY,
    );
    vec![ChatMessage::system(SYSTEM), ChatMessage::user(prompt)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_keeps_full_summary_and_url() {
        let long = "y".repeat(600);
        let items = vec![
            CollectedItem::new("en", "Bridge collapse", &long, "https://a.example/bridge"),
            CollectedItem::new("en", "No link", "short", ""),
        ];
        let listing = source_listing(&items);
        assert!(listing.contains(&long));
        assert!(listing.contains("URL: https://a.example/bridge"));
        assert_eq!(listing.matches("URL:").count(), 1);
    }
}
