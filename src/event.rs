//! The rain event: one thresholded rainfall measurement, the unit of work.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::util::parse_datetime;

/// Free-form attributes carried alongside the measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventExtras {
    pub province: Option<String>,
    pub threshold: Option<f64>,
    pub seq: Option<i64>,
}

/// Immutable once read; consumed read-only by every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RainEvent {
    pub event_id: String,
    /// Raw date string as stored, copied verbatim into the impact record.
    pub date: Option<String>,
    pub event_time: Option<NaiveDateTime>,
    pub location_name: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rainfall_mm: Option<f64>,
    pub severity: Option<String>,
    pub data_source: Option<String>,
    pub extras: EventExtras,
}

impl RainEvent {
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            date: None,
            event_time: None,
            location_name: None,
            country: None,
            latitude: None,
            longitude: None,
            rainfall_mm: None,
            severity: None,
            data_source: None,
            extras: EventExtras::default(),
        }
    }

    pub fn province(&self) -> Option<&str> {
        non_empty(self.extras.province.as_deref())
    }

    pub fn country(&self) -> Option<&str> {
        non_empty(self.country.as_deref())
    }

    pub fn location_name(&self) -> Option<&str> {
        non_empty(self.location_name.as_deref())
    }

    pub fn rainfall_display(&self) -> String {
        self.rainfall_mm
            .map(|mm| format!("{}", mm))
            .unwrap_or_else(|| "N/A".to_string())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Ad-hoc event description accepted on the command line, in the same shape
/// as an event-store row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventInput {
    #[serde(default)]
    pub id: Value,
    pub date: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub value: Option<f64>,
    pub severity_level: Option<String>,
    pub file_name: Option<String>,
    pub threshold: Option<f64>,
    pub seq: Option<i64>,
}

impl EventInput {
    pub fn into_event(self) -> Result<RainEvent> {
        let event_id = match self.id {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(PipelineError::Configuration(
                    "event JSON must carry a non-empty 'id'".to_string(),
                ))
            }
        };
        let event_time = self.date.as_deref().and_then(parse_datetime);
        Ok(RainEvent {
            event_id,
            date: self.date,
            event_time,
            location_name: self.city,
            country: self.country,
            latitude: self.latitude,
            longitude: self.longitude,
            rainfall_mm: self.value,
            severity: self.severity_level,
            data_source: self.file_name,
            extras: EventExtras {
                province: self.province,
                threshold: self.threshold,
                seq: self.seq,
            },
        })
    }
}
