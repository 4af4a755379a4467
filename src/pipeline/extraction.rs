use tracing::info;

use super::validation::ValidatedItem;
use crate::config::Settings;
use crate::error::Result;
use crate::impact::{Extraction, ImpactKind};
use crate::json_repair::parse_object_or_empty;
use crate::llm::{ChatModel, ChatOptions};
use crate::prompt::{extraction_messages, EventBrief};
use crate::TARGET_PIPELINE;

/// Timeline and impact from the validated items. Timeline references index
/// into `relevant`.
pub async fn run_extraction(
    model: &dyn ChatModel,
    brief: &EventBrief,
    relevant: &[ValidatedItem],
    settings: &Settings,
) -> Result<Extraction> {
    if relevant.is_empty() {
        return Ok(Extraction::default());
    }

    let items: Vec<_> = relevant.iter().map(|v| v.item.clone()).collect();
    let messages = extraction_messages(brief, &items);
    let response = model.chat(&messages, &ChatOptions::json(settings)).await?;
    let extraction = Extraction::from_object(&parse_object_or_empty(&response), items.len());

    let categories = ImpactKind::ALL
        .iter()
        .filter(|k| extraction.impact.get(**k).is_some())
        .count();
    info!(
        target: TARGET_PIPELINE,
        "Extraction: {} timeline entries, {} impact categories",
        extraction.timeline.len(),
        categories
    );
    Ok(extraction)
}
