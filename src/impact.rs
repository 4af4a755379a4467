//! Typed view of the extraction stage output: timeline and impact categories.
//!
//! The model answers with loosely shaped JSON. Everything here is lenient on
//! input (strings where numbers were asked for, `"index3"` references, missing
//! keys) and strict on output: a category with no data block is `Absent`, never
//! zero-filled.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    VeryLow,
    Low,
    Moderate,
    High,
    Extreme,
}

impl Severity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "very_low" => Some(Severity::VeryLow),
            "low" => Some(Severity::Low),
            "moderate" | "medium" => Some(Severity::Moderate),
            "high" => Some(Severity::High),
            "extreme" => Some(Severity::Extreme),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactKind {
    Transport,
    Economy,
    Safety,
    Response,
}

impl ImpactKind {
    pub const ALL: [ImpactKind; 4] = [
        ImpactKind::Transport,
        ImpactKind::Economy,
        ImpactKind::Safety,
        ImpactKind::Response,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ImpactKind::Transport => "transport",
            ImpactKind::Economy => "economy",
            ImpactKind::Safety => "safety",
            ImpactKind::Response => "response",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ImpactKind::Transport => "Transport",
            ImpactKind::Economy => "Economy",
            ImpactKind::Safety => "Safety",
            ImpactKind::Response => "Emergency Response",
        }
    }
}

/// Explicit figures reported for a category, plus whatever context came with them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuantitativeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_roads: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridges_damaged: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_loss: Option<String>,
    /// `estimated_loss` normalized to millions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_millions: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injured: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deaths: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evacuated: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub houses_damaged: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub houses_destroyed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImpactData {
    /// At least one figure the scoring rules can band.
    Numeric(QuantitativeRecord),
    /// No usable figure; descriptive text and/or an inferred severity tag.
    Described {
        description: Option<String>,
        severity: Option<Severity>,
        confidence: Option<String>,
    },
    /// The sources never mention this category.
    Absent,
}

impl ImpactData {
    /// Classify a `quantitative_data` block for `kind`. Null, missing and empty
    /// blocks are all `Absent`.
    pub fn from_block(kind: ImpactKind, block: Option<&Value>) -> Self {
        let Some(Value::Object(block)) = block else {
            return ImpactData::Absent;
        };
        if block.is_empty() {
            return ImpactData::Absent;
        }

        let estimated_loss = text_field(block, "estimated_loss");
        let loss_millions = estimated_loss
            .as_deref()
            .map(parse_loss_amount)
            .filter(|loss| *loss > 0.0);
        let record = QuantitativeRecord {
            closed_roads: block.get("closed_roads").and_then(extract_number),
            bridges_damaged: block.get("bridges_damaged").and_then(extract_number),
            estimated_loss,
            loss_millions,
            injured: block.get("injured").and_then(extract_number),
            deaths: block.get("deaths").and_then(extract_number),
            evacuated: block.get("evacuated").and_then(extract_number),
            houses_damaged: block.get("houses_damaged").and_then(extract_number),
            houses_destroyed: block.get("houses_destroyed").and_then(extract_number),
            description: text_field(block, "description"),
            severity: text_field(block, "severity_inference")
                .as_deref()
                .and_then(Severity::parse),
            source: text_field(block, "source"),
            confidence: text_field(block, "confidence"),
        };

        let numeric = match kind {
            ImpactKind::Transport => {
                record.closed_roads.is_some() || record.bridges_damaged.is_some()
            }
            ImpactKind::Economy => record.loss_millions.is_some(),
            ImpactKind::Safety => {
                record.injured.is_some()
                    || record.deaths.is_some()
                    || record.evacuated.is_some()
                    || record.houses_damaged.is_some()
            }
            ImpactKind::Response => false,
        };
        if numeric {
            ImpactData::Numeric(record)
        } else {
            ImpactData::Described {
                description: record.description,
                severity: record.severity,
                confidence: record.confidence,
            }
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ImpactData::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactCategory {
    pub summary: Option<String>,
    pub details: Vec<String>,
    pub data: ImpactData,
}

impl ImpactCategory {
    fn from_value(kind: ImpactKind, value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            summary: text_field(obj, "summary"),
            details: string_list(obj.get("details")),
            data: ImpactData::from_block(kind, obj.get("quantitative_data")),
        })
    }
}

/// Impact categories keyed by kind. A category the model left out is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Impact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<ImpactCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub economy: Option<ImpactCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety: Option<ImpactCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ImpactCategory>,
}

impl Impact {
    pub fn get(&self, kind: ImpactKind) -> Option<&ImpactCategory> {
        match kind {
            ImpactKind::Transport => self.transport.as_ref(),
            ImpactKind::Economy => self.economy.as_ref(),
            ImpactKind::Safety => self.safety.as_ref(),
            ImpactKind::Response => self.response.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ImpactKind::ALL.iter().all(|k| self.get(*k).is_none())
    }

    fn from_value(value: Option<&Value>) -> Self {
        let Some(obj) = value.and_then(Value::as_object) else {
            return Self::default();
        };
        let category = |kind: ImpactKind| {
            obj.get(kind.key())
                .and_then(|v| ImpactCategory::from_value(kind, v))
        };
        Self {
            transport: category(ImpactKind::Transport),
            economy: category(ImpactKind::Economy),
            safety: category(ImpactKind::Safety),
            response: category(ImpactKind::Response),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub time_slot: String,
    pub events: Vec<String>,
    pub highlights: Option<String>,
    /// Indices into the validated item list.
    pub references: Vec<usize>,
}

impl TimelineEntry {
    fn from_value(value: &Value, item_count: usize) -> Option<Self> {
        let obj = value.as_object()?;
        let time_slot = text_field(obj, "time_slot")?;
        let mut references = Vec::new();
        for reference in obj
            .get("references")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(index) = reference_index(reference) {
                if index < item_count && !references.contains(&index) {
                    references.push(index);
                }
            }
        }
        Some(Self {
            time_slot,
            events: string_list(obj.get("events")),
            highlights: text_field(obj, "highlights"),
            references,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub timeline: Vec<TimelineEntry>,
    pub impact: Impact,
}

impl Extraction {
    /// Decode the extraction response. `item_count` bounds timeline references.
    pub fn from_object(obj: &Map<String, Value>, item_count: usize) -> Self {
        let timeline = obj
            .get("timeline")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| TimelineEntry::from_value(e, item_count))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            timeline,
            impact: Impact::from_value(obj.get("impact")),
        }
    }

    pub fn timeline_json(&self) -> String {
        serde_json::to_string(&self.timeline).unwrap_or_else(|_| "[]".to_string())
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

static FIRST_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid integer regex"));

static LOSS_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(million|billion|thousand)?").expect("valid loss regex")
});

/// A count from a number or from the first run of digits in text, e.g. `"15 roads"`.
pub fn extract_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => FIRST_INTEGER
            .find(s)
            .and_then(|m| m.as_str().parse().ok()),
        _ => None,
    }
}

/// Loss amount in millions: `"1.5 billion EUR"` is 1500.0. Unparseable text is 0.
pub fn parse_loss_amount(text: &str) -> f64 {
    let Some(caps) = LOSS_AMOUNT.captures(text) else {
        return 0.0;
    };
    let Ok(amount) = caps[1].parse::<f64>() else {
        return 0.0;
    };
    match caps.get(2).map(|u| u.as_str().to_lowercase()).as_deref() {
        Some("billion") => amount * 1000.0,
        Some("thousand") => amount / 1000.0,
        _ => amount,
    }
}

fn reference_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => FIRST_INTEGER
            .find(s)
            .and_then(|m| m.as_str().parse().ok()),
        _ => None,
    }
}
