use tracing::info;

use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::event::RainEvent;
use crate::impact::Extraction;
use crate::llm::{ChatModel, ChatOptions};
use crate::prompt::{report_messages, EventBrief, SourceRecord};
use crate::terminology::LocationProfile;
use crate::TARGET_PIPELINE;

/// Why a run ended with the fixed template instead of a written report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimalReason {
    /// Every channel came back empty.
    NoItems,
    /// Items were found but none survived screening and validation.
    NoRelevant,
}

/// Narrative Markdown report. Unlike the JSON stages, a failed call aborts
/// the event.
pub async fn run_report(
    model: &dyn ChatModel,
    brief: &EventBrief,
    extraction: &Extraction,
    sources: &[SourceRecord],
    settings: &Settings,
) -> Result<String> {
    let messages = report_messages(brief, &extraction.timeline, &extraction.impact, sources);
    let response = model.chat(&messages, &ChatOptions::text(settings)).await?;
    let report = unwrap_markdown_fence(&response);
    if report.is_empty() {
        return Err(PipelineError::ModelResponse(
            "report generation returned no text".to_string(),
        ));
    }
    info!(
        target: TARGET_PIPELINE,
        "Report written: {} chars, {} sources offered",
        report.chars().count(),
        sources.len()
    );
    Ok(report.to_string())
}

/// Models sometimes wrap the whole document in a ```markdown fence.
fn unwrap_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(newline) = rest.find('\n') else {
        return trimmed;
    };
    let tag = rest[..newline].trim();
    if !(tag.is_empty() || tag.eq_ignore_ascii_case("markdown") || tag.eq_ignore_ascii_case("md")) {
        return trimmed;
    }
    let body = &rest[newline + 1..];
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Fixed five-section report used when there is nothing to write about.
pub fn minimal_report(event: &RainEvent, profile: &LocationProfile, reason: MinimalReason) -> String {
    let location = event.location_name().unwrap_or("N/A");
    let country = event.country().unwrap_or("N/A");
    let province = event.province().unwrap_or("N/A");
    let rainfall = event.rainfall_display();
    let date = event
        .event_time
        .map(|t| t.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let (timeline, causes, summary) = match reason {
        MinimalReason::NoItems => (
            "No timeline could be built: the searches returned no news or media for this event.",
            "- the event is very recent, or too old for the search providers\n\
             - coverage of the event was thin\n\
             - a provider was unavailable or not configured",
            "No news coverage or media was found to describe its timeline, impact or consequences. \
             A manual search may turn up more.",
        ),
        MinimalReason::NoRelevant => (
            "No timeline could be built: none of the items found passed screening and validation.",
            "- the results did not match the event's time, place or keywords\n\
             - coverage of the event was thin\n\
             - the event did not draw much attention",
            "Automated screening and validation found no coverage describing its timeline, impact \
             or consequences. The event may simply not have drawn much attention.",
        ),
    };

    format!(
        r#"# Flood Event Report: {location}, {country}

## 1. Event Overview

On {date}, {location} in {province}, {country} recorded a rainfall event of {rainfall}mm.

*   **Local Terminology:**
    *   Rain: "{rain}"
    *   Flood: "{flood}"

## 2. Flood Timeline

{timeline}

## 3. Multimedia & News Sources

No multimedia content or news sources were found for this event. Possible causes:
{causes}

## 4. Impact Assessment

No impact assessment is available because no relevant sources were found.

## 5. Summary

{location}, {country} recorded {rainfall}mm of rain. {summary}
"#,
        location = location,
        country = country,
        province = province,
        date = date,
        rainfall = rainfall,
        rain = profile.rain_term,
        flood = profile.flood_term,
        timeline = timeline,
        causes = causes,
        summary = summary,
    )
}
