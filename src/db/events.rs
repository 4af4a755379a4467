use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::core::EventStore;
use super::schema::PROCESSED_AT_COLUMN;
use crate::error::{PipelineError, Result};
use crate::event::{EventExtras, RainEvent};
use crate::util::parse_datetime;
use crate::TARGET_DB;

/// Optional row columns, read as text so mixed storage classes all decode.
const COLUMNS: &[&str] = &[
    "date",
    "city",
    "province",
    "country",
    "latitude",
    "longitude",
    "value",
    "severity_level",
    "file_name",
    "threshold",
    "seq",
];

impl EventStore {
    /// Pending events: unflagged, at or above `min_rainfall`, no older than
    /// `lookback_hours`, oldest first, at most `batch_limit`.
    pub async fn fetch_pending(
        &self,
        batch_limit: usize,
        min_rainfall: f64,
        lookback_hours: i64,
    ) -> Result<Vec<RainEvent>> {
        let sql = format!("{} WHERE {}", self.select_clause().await?, self.pending_condition());
        let rows = sqlx::query(&sql).fetch_all(self.pool()).await?;
        let events: Vec<RainEvent> = rows.iter().filter_map(row_to_event).collect();
        let total = events.len();

        let selected = select_pending(
            events,
            min_rainfall,
            lookback_hours,
            batch_limit,
            Utc::now().naive_utc(),
        );
        info!(
            target: TARGET_DB,
            "{} unflagged rows, {} pending events selected",
            total,
            selected.len()
        );
        Ok(selected)
    }

    /// One pending event by id, regardless of rainfall or age.
    pub async fn find_pending(&self, event_id: &str) -> Result<Option<RainEvent>> {
        let sql = format!(
            "{} WHERE CAST({} AS TEXT) = ? AND ({})",
            self.select_clause().await?,
            self.table().id_column,
            self.pending_condition()
        );
        let row = sqlx::query(&sql)
            .bind(event_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.as_ref().and_then(row_to_event))
    }

    /// Flag the event as processed. Failure is logged and reported as
    /// `false`; the event then stays pending and is picked up again.
    pub async fn mark_completed(&self, event: &RainEvent, processed_at: NaiveDateTime) -> bool {
        let table = self.table();
        let sql = format!(
            "UPDATE {} SET {} = 1, {} = ? WHERE CAST({} AS TEXT) = ?",
            table.name, table.flag_column, PROCESSED_AT_COLUMN, table.id_column
        );
        let result = sqlx::query(&sql)
            .bind(processed_at.format("%Y-%m-%dT%H:%M:%S").to_string())
            .bind(&event.event_id)
            .execute(self.pool())
            .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                debug!(target: TARGET_DB, "Marked event {} completed", event.event_id);
                true
            }
            Ok(_) => {
                warn!(target: TARGET_DB, "Event {} not found when marking completed", event.event_id);
                false
            }
            Err(e) => {
                let err = PipelineError::from(e);
                warn!(
                    target: TARGET_DB,
                    "Could not mark event {} completed: {}", event.event_id, err
                );
                false
            }
        }
    }

    fn pending_condition(&self) -> String {
        let flag = &self.table().flag_column;
        format!("{flag} IS NULL OR {flag} = 0", flag = flag)
    }

    /// `SELECT` over the known columns; ones the table lacks read as NULL.
    async fn select_clause(&self) -> Result<String> {
        let present = self.columns().await?;
        let has = |name: &str| present.iter().any(|c| c.eq_ignore_ascii_case(name));
        let table = self.table();

        let mut fields = vec![format!("CAST({} AS TEXT) AS event_id", table.id_column)];
        for column in COLUMNS {
            if has(column) {
                fields.push(format!("CAST({c} AS TEXT) AS {c}", c = column));
            } else {
                fields.push(format!("NULL AS {}", column));
            }
        }
        Ok(format!("SELECT {} FROM {}", fields.join(", "), table.name))
    }
}

fn text(row: &SqliteRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn number(row: &SqliteRow, column: &str) -> Option<f64> {
    text(row, column).and_then(|v| v.parse::<f64>().ok())
}

fn row_to_event(row: &SqliteRow) -> Option<RainEvent> {
    let Some(event_id) = text(row, "event_id") else {
        warn!(target: TARGET_DB, "Skipping event row without an id");
        return None;
    };
    let date = text(row, "date");
    Some(RainEvent {
        event_id,
        event_time: date.as_deref().and_then(parse_datetime),
        date,
        location_name: text(row, "city"),
        country: text(row, "country"),
        latitude: number(row, "latitude"),
        longitude: number(row, "longitude"),
        rainfall_mm: number(row, "value"),
        severity: text(row, "severity_level"),
        data_source: text(row, "file_name"),
        extras: EventExtras {
            province: text(row, "province"),
            threshold: number(row, "threshold"),
            seq: number(row, "seq").map(|s| s as i64),
        },
    })
}

/// Threshold and recency filter, ascending by time with undated events
/// first, without repeated ids, capped to `batch_limit`.
pub fn select_pending(
    events: Vec<RainEvent>,
    min_rainfall: f64,
    lookback_hours: i64,
    batch_limit: usize,
    now: NaiveDateTime,
) -> Vec<RainEvent> {
    let cutoff = now - ChronoDuration::hours(lookback_hours);
    let mut selected: Vec<RainEvent> = events
        .into_iter()
        .filter(|e| matches!(e.rainfall_mm, Some(mm) if mm >= min_rainfall))
        .filter(|e| e.event_time.map_or(true, |t| t >= cutoff))
        .collect();
    selected.sort_by_key(|e| e.event_time);

    let mut seen = HashSet::new();
    selected.retain(|e| seen.insert(e.event_id.clone()));
    selected.truncate(batch_limit);
    selected
}
