//! Report sink and audit artifacts under `OUTPUT_DIR/<YYYYMMDD>/`.

use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::collectors::CollectedItem;
use crate::config::Settings;
use crate::error::Result;
use crate::pipeline::ValidationResult;
use crate::prefilter::FilterLog;
use crate::prompt::EventBrief;
use crate::util::{safe_file_stem, truncate_chars};
use crate::TARGET_PIPELINE;

/// `YYYYMMDD` from the id prefix, else from the event time, else `unknown`.
pub fn date_dir(event_id: &str, event_time: Option<NaiveDateTime>) -> String {
    let prefix: String = event_id.chars().take(8).collect();
    if prefix.len() == 8 && prefix.chars().all(|c| c.is_ascii_digit()) {
        return prefix;
    }
    event_time
        .map(|t| t.format("%Y%m%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn event_dir(output_dir: &Path, event_id: &str, event_time: Option<NaiveDateTime>) -> PathBuf {
    output_dir.join(date_dir(event_id, event_time))
}

pub fn report_path(output_dir: &Path, event_id: &str, event_time: Option<NaiveDateTime>) -> PathBuf {
    event_dir(output_dir, event_id, event_time).join(format!("{}_report.md", safe_file_stem(event_id)))
}

/// Write `contents` to `path` all-or-nothing: a sibling temp file is
/// written first and renamed into place.
pub async fn write_report(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.md".to_string());
    let temp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&temp, contents).await?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Markdown audit files written next to the report while an event runs.
/// A failed write is logged and otherwise ignored.
pub struct AuditTrail {
    dir: PathBuf,
    stem: String,
    event_id: String,
    brief: EventBrief,
}

impl AuditTrail {
    pub fn new(output_dir: &Path, event_id: &str, event_time: Option<NaiveDateTime>, brief: EventBrief) -> Self {
        Self {
            dir: event_dir(output_dir, event_id, event_time),
            stem: safe_file_stem(event_id),
            event_id: event_id.to_string(),
            brief,
        }
    }

    pub fn path(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.md", self.stem, suffix))
    }

    pub async fn raw_items(&self, items: &[CollectedItem], channels: &[String]) -> Option<PathBuf> {
        let mut doc = self.header("Raw search results before pre-filter");
        doc.push_str(&format!(
            "## Totals\n\n- **Items**: {}\n- **Channels**: {}\n\n---\n\n",
            items.len(),
            if channels.is_empty() { "N/A".to_string() } else { channels.join(", ") }
        ));
        for (idx, item) in items.iter().enumerate() {
            doc.push_str(&item_section(idx + 1, item, ""));
        }
        self.save("raw_items_before_filter", &doc).await
    }

    pub async fn filtered_items(
        &self,
        kept: &[CollectedItem],
        rejected: &[FilterLog],
        settings: &Settings,
    ) -> Option<PathBuf> {
        let mut doc = self.header("Search results after pre-filter");
        doc.push_str(&format!(
            "## Screen\n\n- **Mode**: {}\n- **Time window**: event day + {} days\n- **Kept**: {}\n- **Rejected**: {}\n- **Sent to validation**: at most {}\n\n---\n\n",
            settings.pre_filter_mode,
            settings.pre_filter_time_window_days,
            kept.len(),
            rejected.len(),
            settings.max_items_for_validation
        ));
        for (idx, item) in kept.iter().enumerate() {
            let marker = if idx < settings.max_items_for_validation {
                " (sent to validation)"
            } else {
                " (over the validation cap)"
            };
            doc.push_str(&item_section(idx + 1, item, marker));
        }
        if !rejected.is_empty() {
            doc.push_str("## Rejected\n\n```json\n");
            doc.push_str(&serde_json::to_string_pretty(rejected).unwrap_or_default());
            doc.push_str("\n```\n");
        }
        self.save("filtered_items_after_prefilter", &doc).await
    }

    pub async fn validation_results(&self, result: &ValidationResult) -> Option<PathBuf> {
        let mut doc = self.header("Validation results");
        doc.push_str(&format!(
            "## Totals\n\n- **Relevant**: {}\n- **Irrelevant**: {}\n\n---\n\n## Relevant\n\n",
            result.relevant.len(),
            result.irrelevant.len()
        ));
        if result.relevant.is_empty() {
            doc.push_str("None.\n\n");
        }
        for (idx, item) in result.relevant.iter().enumerate() {
            doc.push_str(&format!(
                "### Relevant {}\n\n**Title**: {}\n\n**URL**: {}\n\n**Score**: {:.2}\n\n**Reason**: {}\n\n---\n\n",
                idx + 1,
                item.item.title,
                item.item.url,
                item.relevance_score,
                item.reason
            ));
        }
        doc.push_str("## Irrelevant\n\n");
        if result.irrelevant.is_empty() {
            doc.push_str("None.\n\n");
        }
        for (idx, item) in result.irrelevant.iter().enumerate() {
            doc.push_str(&format!(
                "### Irrelevant {} (candidate {})\n\n**Title**: {}\n\n**URL**: {}\n\n**Reason**: {}\n\n---\n\n",
                idx + 1,
                item.index,
                item.title,
                item.url,
                item.reason
            ));
        }
        doc.push_str(&format!(
            "## Related files\n\n- `{}`\n- `{}`\n",
            self.path("raw_items_before_filter").display(),
            self.path("filtered_items_after_prefilter").display()
        ));
        self.save("llm_validation_results", &doc).await
    }

    fn header(&self, title: &str) -> String {
        let b = &self.brief;
        format!(
            "# {}\n\nGenerated: {}\n\n## Event\n\n- **Event ID**: {}\n- **Time**: {}\n- **Place**: {}\n- **Rainfall**: {}mm\n\n",
            title,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.event_id,
            if b.event_time.is_empty() { "N/A" } else { b.event_time.as_str() },
            b.place(),
            b.rainfall_mm
        )
    }

    async fn save(&self, suffix: &str, doc: &str) -> Option<PathBuf> {
        let path = self.path(suffix);
        match write_report(&path, doc).await {
            Ok(()) => {
                info!(target: TARGET_PIPELINE, "Saved {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!(target: TARGET_PIPELINE, "Could not save {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn item_section(number: usize, item: &CollectedItem, marker: &str) -> String {
    let summary = if item.summary.chars().count() > 300 {
        format!("{}...", truncate_chars(&item.summary, 300))
    } else {
        item.summary.clone()
    };
    format!(
        "### Result {}{}\n\n**Title**: {}\n\n**URL**: {}\n\n**Summary**: {}\n\n**Published**: {}\n\n**Source**: {}\n\n**Channel**: {}\n\n```json\n{}\n```\n\n---\n\n",
        number,
        marker,
        item.title,
        item.url,
        summary,
        item.published_at.as_deref().unwrap_or("N/A"),
        item.source.as_deref().unwrap_or("N/A"),
        item.channel,
        serde_json::to_string_pretty(item).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn time() -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2025, 10, 11).and_then(|d| d.and_hms_opt(6, 0, 0))
    }

    fn brief() -> EventBrief {
        EventBrief {
            event_time: "2025-10-11 06:00:00".to_string(),
            location: "Torrent".to_string(),
            province: "Valencia".to_string(),
            country: "Spain".to_string(),
            rainfall_mm: "80".to_string(),
            rain_term: "lluvia".to_string(),
            flood_term: "inundación".to_string(),
        }
    }

    #[test]
    fn test_date_dir() {
        assert_eq!(date_dir("20251011_Valencia_1", None), "20251011");
        assert_eq!(date_dir("evt-42", time()), "20251011");
        assert_eq!(date_dir("2025101", time()), "20251011");
        assert_eq!(date_dir("evt-42", None), "unknown");
    }

    #[test]
    fn test_report_path() {
        let path = report_path(Path::new("out"), "a/b\\c", time());
        assert_eq!(path, Path::new("out").join("20251011").join("a_b_c_report.md"));
    }

    #[tokio::test]
    async fn test_write_report_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = report_path(dir.path(), "20251011_Valencia_1", None);

        write_report(&path, "# first").await.unwrap();
        write_report(&path, "# second").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# second");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_audit_trail_files() {
        let dir = tempfile::tempdir().unwrap();
        let trail = AuditTrail::new(dir.path(), "20251011_Valencia_1", time(), brief());
        let mut item = CollectedItem::new("es", "Inundaciones en Valencia", &"x".repeat(400), "https://e.com/1");
        item.channel = "news_thenewsapi".to_string();

        let raw = trail.raw_items(&[item.clone()], &["news_thenewsapi".to_string()]).await.unwrap();
        assert!(raw.ends_with("20251011_Valencia_1_raw_items_before_filter.md"));
        let text = std::fs::read_to_string(&raw).unwrap();
        assert!(text.contains("Torrent (Valencia, Spain)"));
        assert!(text.contains(&format!("{}...", "x".repeat(300))));

        let validation = trail.validation_results(&ValidationResult::default()).await.unwrap();
        assert!(std::fs::read_to_string(validation).unwrap().contains("**Relevant**: 0"));
    }

    #[tokio::test]
    async fn test_audit_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the date directory should be
        let blocker = dir.path().join("20251011");
        std::fs::write(&blocker, "").unwrap();
        let trail = AuditTrail::new(dir.path(), "20251011_Valencia_1", time(), brief());
        assert!(trail.raw_items(&[], &[]).await.is_none());
    }
}
