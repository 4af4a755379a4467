//! Runs one rain event end to end: resolve, plan, collect, validate,
//! extract, report, score.

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::collectors::{collect, CollectContext, CollectedItem, CollectorSet, HttpClient};
use crate::config::Settings;
use crate::db::EventStore;
use crate::error::Result;
use crate::event::RainEvent;
use crate::impact::Extraction;
use crate::llm::{ChatModel, LlmBackend};
use crate::output::{report_path, write_report, AuditTrail};
use crate::pipeline::{
    build_sources, minimal_report, prepare_candidates, run_extraction, run_report, run_validation,
    select_media, MinimalReason, ValidatedItem, ValidationResult, MEDIA_LIMIT,
};
use crate::prefilter::EventInfo;
use crate::prompt::EventBrief;
use crate::query::{self, QueryPlan};
use crate::scoring::{self, ImpactScore};
use crate::terminology::{LocationProfile, TerminologyResolver};
use crate::TARGET_PIPELINE;

/// Everything one run produced. Private to that run.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub event: RainEvent,
    pub profile: LocationProfile,
    pub plan: QueryPlan,
    /// Items per channel, in channel-table order.
    pub raw_items: Vec<(String, Vec<CollectedItem>)>,
    pub validation: ValidationResult,
    pub media: Vec<ValidatedItem>,
    pub extraction: Extraction,
    pub score: ImpactScore,
    pub report: String,
    pub report_path: Option<PathBuf>,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
}

impl EventContext {
    fn new(event: RainEvent, profile: LocationProfile, plan: QueryPlan) -> Self {
        Self {
            event,
            profile,
            plan,
            raw_items: Vec::new(),
            validation: ValidationResult::default(),
            media: Vec::new(),
            extraction: Extraction::default(),
            score: ImpactScore::default(),
            report: String::new(),
            report_path: None,
            started_at: Utc::now().naive_utc(),
            finished_at: None,
        }
    }

    pub fn total_items(&self) -> usize {
        self.raw_items.iter().map(|(_, items)| items.len()).sum()
    }

    /// All collected items, each still tagged with its channel.
    pub fn all_items(&self) -> Vec<CollectedItem> {
        self.raw_items
            .iter()
            .flat_map(|(_, items)| items.iter().cloned())
            .collect()
    }

    pub fn impact_record(&self) -> ImpactRecord {
        ImpactRecord {
            rain_event_id: self.event.event_id.clone(),
            date: self.event.date.clone(),
            level: self.score.overall,
            country: self.event.country.clone(),
            province: self.event.extras.province.clone(),
            city: self.event.location_name.clone(),
            transport_impact_level: self.score.transport,
            economy_impact_level: self.score.economy,
            safety_impact_level: self.score.safety,
            timeline_data: self.extraction.timeline_json(),
            source_count: self.validation.relevant.len(),
            detail_file: self
                .report_path
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}

/// Summary row handed back to the caller for each processed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactRecord {
    pub rain_event_id: String,
    pub date: Option<String>,
    pub level: Option<u8>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub transport_impact_level: Option<u8>,
    pub economy_impact_level: Option<u8>,
    pub safety_impact_level: Option<u8>,
    /// The timeline as a JSON string.
    pub timeline_data: String,
    pub source_count: usize,
    pub detail_file: Option<String>,
}

pub struct Orchestrator<'a> {
    settings: &'a Settings,
    model: Box<dyn ChatModel>,
    collectors: CollectorSet,
    resolver: TerminologyResolver,
    http: HttpClient,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        settings: &'a Settings,
        model: Box<dyn ChatModel>,
        collectors: CollectorSet,
        resolver: TerminologyResolver,
        http: HttpClient,
    ) -> Self {
        Self {
            settings,
            model,
            collectors,
            resolver,
            http,
        }
    }

    /// Production wiring: configured model backend, built-in collectors,
    /// terminology table (or its file override).
    pub fn from_settings(settings: &'a Settings) -> Result<Self> {
        let model = LlmBackend::from_settings(settings)?;
        let resolver = TerminologyResolver::load(settings.terminology_file.as_deref())?;
        let http = HttpClient::new(settings.collector_timeout())?;
        Ok(Self::new(
            settings,
            Box::new(model),
            CollectorSet::builtin(),
            resolver,
            http,
        ))
    }

    pub async fn run_for_event(&self, event: RainEvent) -> Result<EventContext> {
        info!(
            target: TARGET_PIPELINE,
            "Processing event {} ({}, {})",
            event.event_id,
            event.location_name().unwrap_or("?"),
            event.country().unwrap_or("?")
        );

        let profile = self.resolver.resolve(&event);
        let plan = query::plan(&event, &profile, self.settings);
        let mut context = EventContext::new(event, profile, plan);
        context.raw_items = self.collect_all(&context).await;

        let brief = EventBrief::new(&context.event, &context.profile);
        let total = context.total_items();
        if total == 0 {
            warn!(
                target: TARGET_PIPELINE,
                "No items collected for {}; skipping model stages. Check API keys and the event date.",
                context.event.event_id
            );
            context.report = minimal_report(&context.event, &context.profile, MinimalReason::NoItems);
        } else {
            info!(
                target: TARGET_PIPELINE,
                "Collected {} items from {} channels",
                total,
                context.raw_items.iter().filter(|(_, i)| !i.is_empty()).count()
            );
            self.analyse(&mut context, &brief).await?;
        }

        context.score = scoring::score(&context.extraction.impact);

        let path = report_path(
            &self.settings.output_dir,
            &context.event.event_id,
            context.event.event_time,
        );
        write_report(&path, &context.report).await?;
        info!(target: TARGET_PIPELINE, "Report saved to {}", path.display());
        context.report_path = Some(path);

        context.finished_at = Some(Utc::now().naive_utc());
        info!(
            target: TARGET_PIPELINE,
            "Finished event {}: level {:?}, {} sources",
            context.event.event_id,
            context.score.overall,
            context.validation.relevant.len()
        );
        Ok(context)
    }

    /// Process every pending event once, marking each success when `mark`
    /// is set. A failed run is logged and the event stays pending.
    pub async fn process_pending(&self, store: &EventStore, mark: bool) -> Result<Vec<EventContext>> {
        let events = store
            .fetch_pending(
                self.settings.batch_limit,
                self.settings.min_rainfall_mm,
                self.settings.max_event_lookback_hours,
            )
            .await?;
        info!(target: TARGET_PIPELINE, "{} pending events", events.len());

        let mut contexts = Vec::with_capacity(events.len());
        for event in events {
            let event_id = event.event_id.clone();
            match self.run_for_event(event).await {
                Ok(context) => {
                    if mark {
                        let processed_at =
                            context.finished_at.unwrap_or_else(|| Utc::now().naive_utc());
                        store.mark_completed(&context.event, processed_at).await;
                    }
                    contexts.push(context);
                }
                Err(e) => {
                    error!(target: TARGET_PIPELINE, "Event {} failed, left pending: {}", event_id, e);
                }
            }
        }
        Ok(contexts)
    }

    /// Channels run one after another; a failing channel contributes nothing.
    async fn collect_all(&self, context: &EventContext) -> Vec<(String, Vec<CollectedItem>)> {
        let ctx = CollectContext {
            event: &context.event,
            profile: &context.profile,
            plan: &context.plan,
            settings: self.settings,
        };

        let mut raw = Vec::new();
        for channel in context.plan.channels.iter().filter(|c| c.enabled) {
            let Some(collector) = self.collectors.get(&channel.provider) else {
                warn!(
                    target: TARGET_PIPELINE,
                    "No collector for provider {} (channel {})", channel.provider, channel.name
                );
                continue;
            };
            let items = match collect(collector, &ctx, channel, &self.http).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(
                        target: TARGET_PIPELINE,
                        "Channel {} yielded nothing: {}", channel.name, e
                    );
                    Vec::new()
                }
            };
            raw.push((channel.name.clone(), items));
        }
        raw
    }

    async fn analyse(&self, context: &mut EventContext, brief: &EventBrief) -> Result<()> {
        let settings = self.settings;
        let trail = AuditTrail::new(
            &settings.output_dir,
            &context.event.event_id,
            context.event.event_time,
            brief.clone(),
        );

        let all_items = context.all_items();
        let channels: Vec<String> = context.raw_items.iter().map(|(name, _)| name.clone()).collect();
        trail.raw_items(&all_items, &channels).await;

        let info = EventInfo::new(&context.event, &context.profile);
        let candidates = prepare_candidates(&all_items, &info, settings);
        if let Some(outcome) = &candidates.prefilter {
            if outcome.kept.len() < candidates.collected {
                info!(
                    target: TARGET_PIPELINE,
                    "Pre-filter removed {} of {} items",
                    candidates.collected - outcome.kept.len(),
                    candidates.collected
                );
                trail.filtered_items(&outcome.kept, &outcome.rejected, settings).await;
            }
        }

        context.validation = run_validation(self.model.as_ref(), brief, &candidates.items, settings).await?;
        trail.validation_results(&context.validation).await;

        if context.validation.is_empty() {
            warn!(
                target: TARGET_PIPELINE,
                "Nothing relevant for {}; skipping extraction and report generation",
                context.event.event_id
            );
            context.report = minimal_report(&context.event, &context.profile, MinimalReason::NoRelevant);
            return Ok(());
        }

        context.extraction =
            run_extraction(self.model.as_ref(), brief, &context.validation.relevant, settings).await?;
        context.media = select_media(&context.validation.relevant, MEDIA_LIMIT);
        let sources = build_sources(&context.validation.relevant, &context.media);
        context.report = run_report(
            self.model.as_ref(),
            brief,
            &context.extraction,
            &sources,
            settings,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{Collector, SearchRequest, DEFAULT_REQUEST_TIMEOUT};
    use crate::db::EventTable;
    use crate::error::PipelineError;
    use crate::llm::{ChatMessage, ChatOptions};
    use crate::query::ChannelConfig;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Answers by stage, recognised from the system prompt.
    struct StageModel {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ChatModel for StageModel {
        async fn chat(&self, messages: &[ChatMessage], _options: &ChatOptions) -> crate::error::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::Transport("model offline".to_string()));
            }
            let system = &messages[0].content;
            if system.contains("information validation expert") {
                let verdicts: Vec<Value> = (0..15)
                    .map(|i| json!({"index": i, "relevance_score": 0.9, "reason": "same flood"}))
                    .collect();
                Ok(json!({"relevant_items": verdicts, "irrelevant_items": []}).to_string())
            } else if system.contains("extraction expert") {
                Ok(r#"{"timeline": [{"time_slot": "Oct 11 morning", "events": ["Roads cut"], "references": ["index0"]}],
                       "impact": {"transport": {"summary": "Twenty roads closed",
                                                "quantitative_data": {"closed_roads": 20}}}}"#
                    .to_string())
            } else {
                Ok("# Torrent under water\n\nThe rain came at dawn.".to_string())
            }
        }
    }

    /// Canned provider: `count` items per language, all mentioning Valencia floods.
    struct Canned {
        provider: &'static str,
        count: usize,
    }

    #[async_trait]
    impl Collector for Canned {
        fn provider(&self) -> &'static str {
            self.provider
        }

        fn credential<'a>(&self, _settings: &'a Settings) -> crate::error::Result<&'a str> {
            Ok("test")
        }

        fn build_request(
            &self,
            _ctx: &CollectContext<'_>,
            channel: &ChannelConfig,
            language: &str,
            _keywords: &[String],
            _query: &str,
        ) -> crate::error::Result<SearchRequest> {
            Ok(SearchRequest::get(&channel.endpoint).param("language", language))
        }

        async fn dispatch(&self, _http: &HttpClient, _request: SearchRequest) -> crate::error::Result<Value> {
            Ok(json!({ "count": self.count }))
        }

        fn parse(&self, _response: &Value, language: &str) -> crate::error::Result<Vec<CollectedItem>> {
            Ok((0..self.count)
                .map(|i| {
                    CollectedItem::new(
                        language,
                        &format!("Valencia flood update {}", i),
                        "Heavy rain flooded streets across the province",
                        &format!("https://{}.example/{}", self.provider, i),
                    )
                })
                .collect())
        }
    }

    fn valencia() -> RainEvent {
        let mut event = RainEvent::new("20251011_Valencia_1");
        event.date = Some("2025-10-11 06:00:00".to_string());
        event.event_time = NaiveDate::from_ymd_opt(2025, 10, 11).and_then(|d| d.and_hms_opt(6, 0, 0));
        event.location_name = Some("Torrent".to_string());
        event.country = Some("Spain".to_string());
        event.rainfall_mm = Some(80.0);
        event.extras.province = Some("Valencia".to_string());
        event
    }

    fn settings(dir: &tempfile::TempDir) -> Settings {
        Settings {
            output_dir: dir.path().to_path_buf(),
            ..Settings::default()
        }
    }

    fn orchestrator<'a>(
        settings: &'a Settings,
        collectors: CollectorSet,
        fail: bool,
    ) -> (Orchestrator<'a>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = StageModel {
            calls: calls.clone(),
            fail,
        };
        let orchestrator = Orchestrator::new(
            settings,
            Box::new(model),
            collectors,
            TerminologyResolver::builtin(),
            HttpClient::new(DEFAULT_REQUEST_TIMEOUT).unwrap(),
        );
        (orchestrator, calls)
    }

    fn news_and_media() -> CollectorSet {
        let news: &'static Canned = Box::leak(Box::new(Canned {
            provider: "thenewsapi",
            count: 13,
        }));
        let media: &'static Canned = Box::leak(Box::new(Canned {
            provider: "youtube",
            count: 2,
        }));
        CollectorSet::empty().with(news).with(media)
    }

    #[tokio::test]
    async fn test_zero_items_skips_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let (orchestrator, calls) = orchestrator(&settings, CollectorSet::empty(), false);

        let context = orchestrator.run_for_event(valencia()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(context.total_items(), 0);
        assert!(context.report.starts_with("# Flood Event Report: Torrent, Spain"));
        assert!(context.finished_at.is_some());

        let path = context.report_path.clone().unwrap();
        assert_eq!(path, dir.path().join("20251011").join("20251011_Valencia_1_report.md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), context.report);

        let record = context.impact_record();
        assert_eq!(record.level, None);
        assert_eq!(record.source_count, 0);
        assert_eq!(record.timeline_data, "[]");
        assert_eq!(record.province.as_deref(), Some("Valencia"));
    }

    #[tokio::test]
    async fn test_full_run_keeps_media_first() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let (orchestrator, calls) = orchestrator(&settings, news_and_media(), false);

        let context = orchestrator.run_for_event(valencia()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(context.total_items(), 15);

        let relevant = &context.validation.relevant;
        assert_eq!(relevant.len(), 10);
        let media = relevant.iter().filter(|v| v.is_priority()).count();
        assert_eq!(media, 2);
        assert!(relevant[..2].iter().all(|v| v.is_priority()));
        assert_eq!(context.media.len(), 2);

        assert_eq!(context.score.transport, Some(7));
        assert_eq!(context.score.overall, Some(3));
        assert!(context.report.starts_with("# Torrent under water"));

        let record = context.impact_record();
        assert_eq!(record.source_count, 10);
        assert_eq!(record.transport_impact_level, Some(7));
        assert!(record.timeline_data.contains("Oct 11 morning"));

        let day = dir.path().join("20251011");
        assert!(day.join("20251011_Valencia_1_raw_items_before_filter.md").exists());
        assert!(day.join("20251011_Valencia_1_llm_validation_results.md").exists());
        assert!(day.join("20251011_Valencia_1_report.md").exists());
    }

    #[tokio::test]
    async fn test_model_failure_aborts_the_event() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let (orchestrator, calls) = orchestrator(&settings, news_and_media(), true);

        let result = orchestrator.run_for_event(valencia()).await;
        assert!(matches!(result, Err(PipelineError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("20251011").join("20251011_Valencia_1_report.md").exists());
    }

    async fn store_with_event(dir: &tempfile::TempDir) -> EventStore {
        let db_path = dir.path().join("events.db");
        let store = EventStore::connect(db_path.to_str().unwrap(), EventTable::default())
            .await
            .unwrap();
        let recent = (Utc::now().naive_utc() - chrono::Duration::hours(2))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        sqlx::query(
            "INSERT INTO rain_event (id, date, city, province, country, value) \
             VALUES ('evt-1', ?, 'Torrent', 'Valencia', 'Spain', 90.0)",
        )
        .bind(&recent)
        .execute(store.pool())
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn test_process_pending_marks_completed() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let store = store_with_event(&dir).await;

        let (orchestrator, _) = orchestrator(&settings, CollectorSet::empty(), false);
        let contexts = orchestrator.process_pending(&store, true).await.unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].event.event_id, "evt-1");
        assert!(store.find_pending("evt-1").await.unwrap().is_none());
        assert!(orchestrator.process_pending(&store, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_pending_without_marking() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let store = store_with_event(&dir).await;

        let (orchestrator, _) = orchestrator(&settings, CollectorSet::empty(), false);
        let contexts = orchestrator.process_pending(&store, false).await.unwrap();
        assert_eq!(contexts.len(), 1);
        assert!(contexts[0].report_path.as_ref().is_some_and(|p| p.exists()));
        assert!(store.find_pending("evt-1").await.unwrap().is_some());
    }
}
