use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde_json::{json, Value};
use std::path::Path;
use tokio::signal;
use tokio::time::sleep;
use tracing::{error, info};

use rainscout::config::Settings;
use rainscout::db::EventStore;
use rainscout::event::{EventInput, RainEvent};
use rainscout::logging::configure_logging;
use rainscout::orchestrator::{EventContext, Orchestrator};
use rainscout::TARGET_PIPELINE;

#[derive(Parser)]
#[clap(
    name = "rainscout",
    about = "Collect, validate and report on heavy-rain events"
)]
struct Cli {
    /// Process one pending event by id
    #[clap(long, conflicts_with = "json")]
    event_id: Option<String>,

    /// Process an ad-hoc event, given as a JSON string or a path to a JSON file
    #[clap(long)]
    json: Option<String>,

    /// Leave processed events pending
    #[clap(long)]
    dry_run: bool,

    /// Keep polling for pending events until interrupted
    #[clap(long, conflicts_with_all = ["event_id", "json"])]
    watch: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let event_hint = cli.event_id.clone();

    match run(cli).await {
        Ok(payload) => println!("{}", payload),
        Err(e) => {
            error!(target: TARGET_PIPELINE, "Run failed: {:#}", e);
            println!(
                "{}",
                json!({
                    "success": false,
                    "event_id": event_hint,
                    "error": format!("{:#}", e),
                })
            );
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<Value> {
    // Logging first, so fallback warnings from parsing the environment are kept
    configure_logging(&Settings::log_dir_from_env());
    let settings = Settings::from_env().context("invalid configuration")?;
    info!(
        target: TARGET_PIPELINE,
        "Starting rainscout (provider {:?}, output {})",
        settings.llm_provider,
        settings.output_dir.display()
    );

    let orchestrator =
        Orchestrator::from_settings(&settings).context("could not set up the pipeline")?;

    // Ad-hoc events never touch the store.
    if let Some(raw) = cli.json.as_deref() {
        let event = load_event(raw)?;
        let context = orchestrator.run_for_event(event).await?;
        return Ok(single_payload(&context));
    }

    let store = EventStore::from_settings(&settings)
        .await
        .context("could not open the event store")?;

    if let Some(event_id) = cli.event_id.as_deref() {
        let event = store
            .find_pending(event_id)
            .await?
            .with_context(|| format!("no pending event with id {}", event_id))?;
        let context = orchestrator.run_for_event(event).await?;
        if !cli.dry_run {
            let processed_at = context
                .finished_at
                .unwrap_or_else(|| Utc::now().naive_utc());
            store.mark_completed(&context.event, processed_at).await;
        }
        return Ok(single_payload(&context));
    }

    if cli.watch {
        let processed = watch(&orchestrator, &store, &settings).await;
        return Ok(json!({ "success": true, "processed_total": processed }));
    }

    let contexts = orchestrator.process_pending(&store, !cli.dry_run).await?;
    let processed: Vec<Value> = contexts.iter().map(summary).collect();
    Ok(json!({ "success": true, "processed": processed }))
}

/// Accepts inline JSON or a path to a file holding it.
fn load_event(raw: &str) -> Result<RainEvent> {
    let trimmed = raw.trim();
    let text = if !trimmed.starts_with('{') && Path::new(trimmed).is_file() {
        std::fs::read_to_string(trimmed)
            .with_context(|| format!("could not read event file {}", trimmed))?
    } else {
        trimmed.to_string()
    };
    let input: EventInput = serde_json::from_str(&text).context("invalid event JSON")?;
    Ok(input.into_event()?)
}

async fn watch(orchestrator: &Orchestrator<'_>, store: &EventStore, settings: &Settings) -> usize {
    info!(
        target: TARGET_PIPELINE,
        "Watching for pending events every {}s",
        settings.poll_interval_seconds
    );
    let mut total = 0;
    loop {
        match orchestrator.process_pending(store, true).await {
            Ok(contexts) => total += contexts.len(),
            Err(e) => error!(target: TARGET_PIPELINE, "Polling failed: {}", e),
        }

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!(target: TARGET_PIPELINE, "Interrupted, {} events processed", total);
                return total;
            }
            _ = sleep(settings.poll_interval()) => {}
        }
    }
}

fn summary(context: &EventContext) -> Value {
    json!({
        "event_id": context.event.event_id,
        "impact_record": context.impact_record(),
        "report_file": context.report_path.as_ref().map(|p| p.display().to_string()),
    })
}

fn single_payload(context: &EventContext) -> Value {
    let mut payload = summary(context);
    if let Value::Object(map) = &mut payload {
        map.insert("success".to_string(), Value::Bool(true));
    }
    payload
}
