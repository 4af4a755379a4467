//! Country → official-language terminology.
//!
//! A small built-in table covers the countries the measurement network
//! reports on; a JSON file of the same shape can replace it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::event::RainEvent;

pub const ENGLISH_CODE: &str = "en";
pub const DEFAULT_RAIN_TERM: &str = "rain";
pub const DEFAULT_FLOOD_TERM: &str = "flood";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageTerms {
    pub name: String,
    pub code: String,
    pub rain_term: String,
    pub flood_term: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryEntry {
    pub country_names: Vec<String>,
    pub primary_name: String,
    pub country_code: String,
    pub languages: Vec<LanguageTerms>,
}

/// Derived per event, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationProfile {
    pub location_name: Option<String>,
    pub province: Option<String>,
    /// Country as it appears on the event.
    pub country: Option<String>,
    /// Country name in its official language.
    pub country_native: Option<String>,
    pub country_code: Option<String>,
    pub language_name: String,
    pub language_code: String,
    pub rain_term: String,
    pub flood_term: String,
}

impl LocationProfile {
    pub fn is_english(&self) -> bool {
        self.language_code == ENGLISH_CODE
    }

    fn empty(event: &RainEvent) -> Self {
        Self {
            location_name: event.location_name().map(str::to_string),
            province: event.province().map(str::to_string),
            country: event.country().map(str::to_string),
            country_native: None,
            country_code: None,
            language_name: "English".to_string(),
            language_code: ENGLISH_CODE.to_string(),
            rain_term: DEFAULT_RAIN_TERM.to_string(),
            flood_term: DEFAULT_FLOOD_TERM.to_string(),
        }
    }
}

type BuiltinLanguage = (&'static str, &'static str, &'static str, &'static str);
type BuiltinCountry = (
    &'static str,
    &'static [&'static str],
    &'static str,
    &'static str,
    &'static [BuiltinLanguage],
);

const BUILTIN: &[BuiltinCountry] = &[
    (
        "Spain",
        &["spain", "españa", "espana"],
        "España",
        "ES",
        &[("Spanish", "es", "lluvia", "inundación"), ("Catalan", "ca", "pluja", "inundació")],
    ),
    ("France", &["france"], "France", "FR", &[("French", "fr", "pluie", "inondation")]),
    (
        "Germany",
        &["germany", "deutschland"],
        "Deutschland",
        "DE",
        &[("German", "de", "Regen", "Hochwasser")],
    ),
    (
        "Italy",
        &["italy", "italia"],
        "Italia",
        "IT",
        &[("Italian", "it", "pioggia", "alluvione")],
    ),
    (
        "Portugal",
        &["portugal"],
        "Portugal",
        "PT",
        &[("Portuguese", "pt", "chuva", "inundação")],
    ),
    (
        "United Kingdom",
        &["united kingdom", "uk", "great britain", "england", "scotland", "wales"],
        "United Kingdom",
        "GB",
        &[("English", "en", "rain", "flood")],
    ),
    (
        "United States",
        &["united states", "united states of america", "usa", "us"],
        "United States",
        "US",
        &[("English", "en", "rain", "flood")],
    ),
    ("Ireland", &["ireland", "éire"], "Ireland", "IE", &[("English", "en", "rain", "flood")]),
    (
        "Greece",
        &["greece", "hellas", "ελλάδα"],
        "Ελλάδα",
        "GR",
        &[("Greek", "el", "βροχή", "πλημμύρα")],
    ),
    (
        "Netherlands",
        &["netherlands", "the netherlands", "nederland", "holland"],
        "Nederland",
        "NL",
        &[("Dutch", "nl", "regen", "overstroming")],
    ),
    ("Poland", &["poland", "polska"], "Polska", "PL", &[("Polish", "pl", "deszcz", "powódź")]),
    (
        "Austria",
        &["austria", "österreich"],
        "Österreich",
        "AT",
        &[("German", "de", "Regen", "Hochwasser")],
    ),
    (
        "Belgium",
        &["belgium", "belgië", "belgique"],
        "België",
        "BE",
        &[("Dutch", "nl", "regen", "overstroming"), ("French", "fr", "pluie", "inondation")],
    ),
    (
        "Switzerland",
        &["switzerland", "schweiz", "suisse", "svizzera"],
        "Schweiz",
        "CH",
        &[
            ("German", "de", "Regen", "Hochwasser"),
            ("French", "fr", "pluie", "inondation"),
            ("Italian", "it", "pioggia", "alluvione"),
        ],
    ),
    (
        "Czechia",
        &["czechia", "czech republic", "česko"],
        "Česko",
        "CZ",
        &[("Czech", "cs", "déšť", "povodeň")],
    ),
    (
        "Romania",
        &["romania", "românia"],
        "România",
        "RO",
        &[("Romanian", "ro", "ploaie", "inundație")],
    ),
    (
        "Croatia",
        &["croatia", "hrvatska"],
        "Hrvatska",
        "HR",
        &[("Croatian", "hr", "kiša", "poplava")],
    ),
    (
        "Slovenia",
        &["slovenia", "slovenija"],
        "Slovenija",
        "SI",
        &[("Slovenian", "sl", "dež", "poplava")],
    ),
    (
        "Hungary",
        &["hungary", "magyarország"],
        "Magyarország",
        "HU",
        &[("Hungarian", "hu", "eső", "árvíz")],
    ),
    (
        "Slovakia",
        &["slovakia", "slovensko"],
        "Slovensko",
        "SK",
        &[("Slovak", "sk", "dážď", "povodeň")],
    ),
    (
        "Bulgaria",
        &["bulgaria", "българия"],
        "България",
        "BG",
        &[("Bulgarian", "bg", "дъжд", "наводнение")],
    ),
];

#[derive(Debug, Clone)]
pub struct TerminologyResolver {
    countries: BTreeMap<String, CountryEntry>,
}

impl TerminologyResolver {
    pub fn builtin() -> Self {
        let countries = BUILTIN
            .iter()
            .map(|(key, names, primary, code, languages)| {
                let entry = CountryEntry {
                    country_names: names.iter().map(|n| n.to_string()).collect(),
                    primary_name: primary.to_string(),
                    country_code: code.to_string(),
                    languages: languages
                        .iter()
                        .map(|(name, code, rain, flood)| LanguageTerms {
                            name: name.to_string(),
                            code: code.to_string(),
                            rain_term: rain.to_string(),
                            flood_term: flood.to_string(),
                        })
                        .collect(),
                };
                (key.to_string(), entry)
            })
            .collect();
        Self { countries }
    }

    /// Load a replacement table from a JSON object keyed by country.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "cannot read terminology file {}: {}",
                path.display(),
                e
            ))
        })?;
        let countries: BTreeMap<String, CountryEntry> = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Configuration(format!(
                "invalid terminology file {}: {}",
                path.display(),
                e
            ))
        })?;
        info!("Loaded terminology for {} countries from {}", countries.len(), path.display());
        Ok(Self { countries })
    }

    /// Built-in table unless a replacement file is configured.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn lookup(&self, country: &str) -> Option<&CountryEntry> {
        let needle = country.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.countries.iter().find_map(|(key, entry)| {
            let matches = key.to_lowercase() == needle
                || entry
                    .country_names
                    .iter()
                    .any(|n| n.trim().to_lowercase() == needle);
            matches.then_some(entry)
        })
    }

    /// Unknown or missing countries resolve to an English profile; this is not an error.
    pub fn resolve(&self, event: &RainEvent) -> LocationProfile {
        let mut profile = LocationProfile::empty(event);

        let Some(country) = event.country() else {
            debug!("Event {} has no country, using English terminology", event.event_id);
            return profile;
        };
        let Some(entry) = self.lookup(country) else {
            debug!("No terminology for country '{}', using English terms", country);
            return profile;
        };

        profile.country_native = Some(entry.primary_name.clone());
        profile.country_code = Some(entry.country_code.clone());
        if let Some(language) = entry.languages.first() {
            profile.language_name = language.name.clone();
            profile.language_code = language.code.to_lowercase();
            profile.rain_term = language.rain_term.clone();
            profile.flood_term = language.flood_term.clone();
        }
        profile
    }
}
