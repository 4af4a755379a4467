use crate::event::RainEvent;
use crate::terminology::LocationProfile;

pub const JSON_ONLY: &str = r#"
Output rules:
- Reply with a single JSON object and nothing else.
- Do not wrap it in ``` fences and do not add commentary before or after it.
- Use double quotes for every key and string value.
"#;

pub const NO_FABRICATION: &str = r#"
Never invent facts, figures or links. Use only URLs that appear in the material above.
If something is not covered by the sources, say so plainly."#;

/// Event facts shared by every prompt, rendered once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBrief {
    pub event_time: String,
    pub location: String,
    pub province: String,
    pub country: String,
    pub rainfall_mm: String,
    pub rain_term: String,
    pub flood_term: String,
}

impl EventBrief {
    pub fn new(event: &RainEvent, profile: &LocationProfile) -> Self {
        Self {
            event_time: event
                .event_time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            location: event.location_name().unwrap_or_default().to_string(),
            province: event.province().unwrap_or_default().to_string(),
            country: event.country().unwrap_or_default().to_string(),
            rainfall_mm: event.rainfall_display(),
            rain_term: profile.rain_term.clone(),
            flood_term: profile.flood_term.clone(),
        }
    }

    /// `Location (Province, Country)`, skipping blanks.
    pub fn place(&self) -> String {
        let region: Vec<&str> = [self.province.as_str(), self.country.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        match (self.location.is_empty(), region.is_empty()) {
            (false, false) => format!("{} ({})", self.location, region.join(", ")),
            (false, true) => self.location.clone(),
            (true, false) => region.join(", "),
            (true, true) => "unknown location".to_string(),
        }
    }
}

pub(crate) fn or_na(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("N/A")
}
