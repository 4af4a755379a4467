use serde::Serialize;

use super::common::{EventBrief, NO_FABRICATION};
use crate::impact::{Impact, ImpactKind, TimelineEntry};
use crate::llm::ChatMessage;
use crate::util::truncate_chars;

const SYSTEM: &str = "You are a story map writer. You turn verified facts about a flood into a \
narrative report in the manner of an ArcGIS StoryMap: vivid, readable and strictly faithful to \
the sources.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    News,
    Media,
}

/// A real, already-collected source the report may cite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub source: Option<String>,
    pub published_at: Option<String>,
}

fn timeline_block(timeline: &[TimelineEntry]) -> String {
    if timeline.is_empty() {
        return "No timeline information is available.".to_string();
    }
    timeline
        .iter()
        .map(|entry| {
            let highlight = entry
                .highlights
                .clone()
                .unwrap_or_else(|| entry.events.join("; "));
            format!("- {}: {}", entry.time_slot, highlight)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn impact_block(impact: &Impact) -> String {
    let lines: Vec<String> = ImpactKind::ALL
        .iter()
        .filter_map(|kind| {
            let category = impact.get(*kind)?;
            Some(format!(
                "- {}: {}",
                kind.key(),
                category.summary.as_deref().unwrap_or("N/A")
            ))
        })
        .collect();
    if lines.is_empty() {
        "No impact information is available.".to_string()
    } else {
        lines.join("\n")
    }
}

fn sources_block(sources: &[SourceRecord]) -> String {
    if sources.is_empty() {
        return "No verified news or multimedia sources are available. State this plainly and do not \
create placeholder links."
            .to_string();
    }
    let mut out = String::new();
    for (n, record) in sources.iter().enumerate() {
        out.push_str(&format!(
            "\n[{}] ({}) {}\n    URL: {}\n",
            n + 1,
            match record.source_type {
                SourceType::News => "news",
                SourceType::Media => "media",
            },
            record.title,
            record.url
        ));
        if !record.summary.is_empty() {
            out.push_str(&format!("    Description: {}\n", truncate_chars(&record.summary, 200)));
        }
        if let Some(source) = &record.source {
            out.push_str(&format!("    Source: {}\n", source));
        }
        if let Some(published) = &record.published_at {
            out.push_str(&format!("    Published: {}\n", published));
        }
    }
    out
}

pub fn report_messages(
    brief: &EventBrief,
    timeline: &[TimelineEntry],
    impact: &Impact,
    sources: &[SourceRecord],
) -> Vec<ChatMessage> {
    let prompt = format!(
        r#"Write an English Markdown report on this flood event, told as a story.

## EVENT
- Time: {time}
- Place: {place}
- Rainfall: {rainfall}mm
- Local words: "{rain}" (rain), "{flood}" (flood)

## TIMELINE
{timeline}

## IMPACT
{impact}

## NEWS AND MULTIMEDIA SOURCES
{sources}

## STRUCTURE
1. **Title and introduction**: an engaging `#` title naming the place, then an opening paragraph that sets
   the scene with the time, the place and the rainfall, weaving in "{rain}" and "{flood}".
2. **Event overview**: how the event developed and what kind of area it struck, in flowing paragraphs.
3. **Timeline**: one `###` sub-section per time slot, written as a continuous account; put exact times in **bold**.
4. **Impact assessment**: `###` sub-sections for transport, economy, safety and emergency response, with
   figures worked into the prose and sources credited in passing. Note disagreements between sources.
5. **Multimedia and news sources**: a short paragraph per source above, linked as `[description](URL)`.
   If there are none, write "No multimedia content is available for this event."
6. **Conclusion**: what the event meant for the area and what it suggests for the next one.

Use `##` for sections, `###` for sub-sections and `---` between sections. Prefer paragraphs to lists.
Return the Markdown itself, not wrapped in a code block.
{no_fabrication}"#,
        time = brief.event_time,
        place = brief.place(),
        rainfall = brief.rainfall_mm,
        rain = brief.rain_term,
        flood = brief.flood_term,
        timeline = timeline_block(timeline),
        impact = impact_block(impact),
        sources = sources_block(sources),
        no_fabrication = NO_FABRICATION,
    );
    vec![ChatMessage::system(SYSTEM), ChatMessage::user(prompt)]
}
