//! Process-wide settings, built once at startup and passed by reference.
//!
//! `Settings::from_env` reads the variables below (after loading an optional
//! `.env` file); anything unset falls back to `Settings::default()`.
//!
//! - `DATABASE_PATH`, `RAIN_EVENTS_TABLE`, `RAIN_EVENTS_ID_COLUMN`, `RAIN_EVENTS_FLAG_COLUMN`
//! - `BATCH_LIMIT`, `MIN_RAINFALL_MM`, `MAX_EVENT_LOOKBACK_HOURS`, `POLL_INTERVAL_SECONDS`
//! - `NEWS_SEARCH_WINDOW_DAYS`
//! - `PRE_FILTER_ENABLED`, `PRE_FILTER_MODE`, `PRE_FILTER_TIME_WINDOW_DAYS`,
//!   `PRE_FILTER_MEDIA_CAP`, `PRE_FILTER_TOTAL_CAP`
//! - `MAX_ITEMS_FOR_LLM_VALIDATION`, `VALIDATION_MEDIA_CAP`, `VALIDATION_TOTAL_CAP`,
//!   `LLM_VALIDATION_TIME_WINDOW_DAYS`
//! - `LLM_PROVIDER`, `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`, `OLLAMA_HOST`,
//!   `OLLAMA_PORT`, `OLLAMA_MODEL`, `LLM_TEMPERATURE`, `LLM_MAX_TOKENS`, `LLM_TIMEOUT_SECONDS`
//! - `TAVILY_API_KEY`, `THENEWSAPI_KEY`, `GNEWS_API_KEY`, `SERPAPI_KEY`, `YOUTUBE_API_KEY`,
//!   `X_BEARER_TOKEN`, `INSTAGRAM_ACCESS_TOKEN`
//! - `COLLECTOR_TIMEOUT_SECONDS`, `ENABLED_CHANNELS`
//! - `TERMINOLOGY_FILE`, `OUTPUT_DIR`, `LOG_DIR`

use std::path::PathBuf;
use std::time::Duration;

use crate::environment::{get_env_bool, get_env_parsed, get_env_var, get_env_var_as_vec};
use crate::error::{PipelineError, Result};
use crate::prefilter::FilterMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "ollama" => Ok(LlmProvider::Ollama),
            other => Err(PipelineError::Configuration(format!(
                "unknown LLM_PROVIDER '{}', expected openai or ollama",
                other
            ))),
        }
    }
}

/// Credentials for the search providers. Absent keys disable the channel.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub tavily: Option<String>,
    pub thenewsapi: Option<String>,
    pub gnews: Option<String>,
    pub serpapi: Option<String>,
    pub youtube: Option<String>,
    pub x_bearer: Option<String>,
    pub instagram: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    // Event store
    pub database_path: String,
    pub events_table: String,
    pub id_column: String,
    pub flag_column: String,

    // Watcher
    pub batch_limit: usize,
    pub min_rainfall_mm: f64,
    pub max_event_lookback_hours: i64,
    pub poll_interval_seconds: u64,

    pub news_search_window_days: i64,

    // Pre-filter
    pub pre_filter_enabled: bool,
    pub pre_filter_mode: FilterMode,
    pub pre_filter_time_window_days: i64,
    pub pre_filter_media_cap: usize,
    pub pre_filter_total_cap: usize,

    // Validation
    pub max_items_for_validation: usize,
    pub validation_media_cap: usize,
    pub validation_total_cap: usize,
    pub validation_time_window_days: i64,

    // Model backend
    pub llm_provider: LlmProvider,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: String,
    pub ollama_host: String,
    pub ollama_port: u16,
    pub ollama_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub llm_timeout_seconds: u64,

    pub api_keys: ApiKeys,
    pub collector_timeout_seconds: u64,
    /// When non-empty, replaces the default enabled flags of the channel table.
    pub enabled_channels: Vec<String>,

    pub terminology_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: "rainscout.db".to_string(),
            events_table: "rain_event".to_string(),
            id_column: "id".to_string(),
            flag_column: "searched".to_string(),
            batch_limit: 20,
            min_rainfall_mm: 50.0,
            max_event_lookback_hours: 48,
            poll_interval_seconds: 300,
            news_search_window_days: 3,
            pre_filter_enabled: true,
            pre_filter_mode: FilterMode::Strict,
            pre_filter_time_window_days: 3,
            pre_filter_media_cap: 3,
            pre_filter_total_cap: 15,
            max_items_for_validation: 15,
            validation_media_cap: 3,
            validation_total_cap: 10,
            validation_time_window_days: 5,
            llm_provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            openai_model: "gpt-4o-mini".to_string(),
            ollama_host: "localhost".to_string(),
            ollama_port: 11434,
            ollama_model: "llama3".to_string(),
            llm_temperature: 0.3,
            llm_max_tokens: 8000,
            llm_timeout_seconds: 60,
            api_keys: ApiKeys::default(),
            collector_timeout_seconds: 30,
            enabled_channels: Vec::new(),
            terminology_file: None,
            output_dir: PathBuf::from("search_outputs"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Settings {
    /// `LOG_DIR` on its own, so logging can be up before the rest of the
    /// environment is parsed and its fallback warnings are recorded.
    pub fn log_dir_from_env() -> PathBuf {
        let _ = dotenvy::dotenv();
        get_env_var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| Settings::default().log_dir)
    }

    /// Builds settings from the environment. Invalid table/column identifiers
    /// and unknown provider names are configuration errors.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let d = Settings::default();

        let llm_provider = match get_env_var("LLM_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => d.llm_provider,
        };
        let pre_filter_mode = match get_env_var("PRE_FILTER_MODE") {
            Some(raw) => raw.parse()?,
            None => d.pre_filter_mode,
        };

        let settings = Self {
            database_path: get_env_var("DATABASE_PATH").unwrap_or(d.database_path),
            events_table: get_env_var("RAIN_EVENTS_TABLE").unwrap_or(d.events_table),
            id_column: get_env_var("RAIN_EVENTS_ID_COLUMN").unwrap_or(d.id_column),
            flag_column: get_env_var("RAIN_EVENTS_FLAG_COLUMN").unwrap_or(d.flag_column),
            batch_limit: get_env_parsed("BATCH_LIMIT", d.batch_limit),
            min_rainfall_mm: get_env_parsed("MIN_RAINFALL_MM", d.min_rainfall_mm),
            max_event_lookback_hours: get_env_parsed(
                "MAX_EVENT_LOOKBACK_HOURS",
                d.max_event_lookback_hours,
            ),
            poll_interval_seconds: get_env_parsed("POLL_INTERVAL_SECONDS", d.poll_interval_seconds),
            news_search_window_days: get_env_parsed(
                "NEWS_SEARCH_WINDOW_DAYS",
                d.news_search_window_days,
            ),
            pre_filter_enabled: get_env_bool("PRE_FILTER_ENABLED", d.pre_filter_enabled),
            pre_filter_mode,
            pre_filter_time_window_days: get_env_parsed(
                "PRE_FILTER_TIME_WINDOW_DAYS",
                d.pre_filter_time_window_days,
            ),
            pre_filter_media_cap: get_env_parsed("PRE_FILTER_MEDIA_CAP", d.pre_filter_media_cap),
            pre_filter_total_cap: get_env_parsed("PRE_FILTER_TOTAL_CAP", d.pre_filter_total_cap),
            max_items_for_validation: get_env_parsed(
                "MAX_ITEMS_FOR_LLM_VALIDATION",
                d.max_items_for_validation,
            ),
            validation_media_cap: get_env_parsed("VALIDATION_MEDIA_CAP", d.validation_media_cap),
            validation_total_cap: get_env_parsed("VALIDATION_TOTAL_CAP", d.validation_total_cap),
            validation_time_window_days: get_env_parsed(
                "LLM_VALIDATION_TIME_WINDOW_DAYS",
                d.validation_time_window_days,
            ),
            llm_provider,
            openai_api_key: get_env_var("OPENAI_API_KEY"),
            openai_base_url: get_env_var("OPENAI_BASE_URL"),
            openai_model: get_env_var("OPENAI_MODEL").unwrap_or(d.openai_model),
            ollama_host: get_env_var("OLLAMA_HOST").unwrap_or(d.ollama_host),
            ollama_port: get_env_parsed("OLLAMA_PORT", d.ollama_port),
            ollama_model: get_env_var("OLLAMA_MODEL").unwrap_or(d.ollama_model),
            llm_temperature: get_env_parsed("LLM_TEMPERATURE", d.llm_temperature),
            llm_max_tokens: get_env_parsed("LLM_MAX_TOKENS", d.llm_max_tokens),
            llm_timeout_seconds: get_env_parsed("LLM_TIMEOUT_SECONDS", d.llm_timeout_seconds),
            api_keys: ApiKeys {
                tavily: get_env_var("TAVILY_API_KEY"),
                thenewsapi: get_env_var("THENEWSAPI_KEY"),
                gnews: get_env_var("GNEWS_API_KEY"),
                serpapi: get_env_var("SERPAPI_KEY"),
                youtube: get_env_var("YOUTUBE_API_KEY"),
                x_bearer: get_env_var("X_BEARER_TOKEN"),
                instagram: get_env_var("INSTAGRAM_ACCESS_TOKEN"),
            },
            collector_timeout_seconds: get_env_parsed(
                "COLLECTOR_TIMEOUT_SECONDS",
                d.collector_timeout_seconds,
            ),
            enabled_channels: get_env_var_as_vec("ENABLED_CHANNELS", ';'),
            terminology_file: get_env_var("TERMINOLOGY_FILE").map(PathBuf::from),
            output_dir: get_env_var("OUTPUT_DIR").map(PathBuf::from).unwrap_or(d.output_dir),
            log_dir: Self::log_dir_from_env(),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Table and column names are interpolated into SQL, so they must be plain identifiers.
    pub fn validate(&self) -> Result<()> {
        for (label, ident) in [
            ("RAIN_EVENTS_TABLE", &self.events_table),
            ("RAIN_EVENTS_ID_COLUMN", &self.id_column),
            ("RAIN_EVENTS_FLAG_COLUMN", &self.flag_column),
        ] {
            if !is_sql_identifier(ident) {
                return Err(PipelineError::Configuration(format!(
                    "{} must be a plain identifier, got '{}'",
                    label, ident
                )));
            }
        }
        if self.validation_media_cap > self.validation_total_cap {
            return Err(PipelineError::Configuration(
                "VALIDATION_MEDIA_CAP cannot exceed VALIDATION_TOTAL_CAP".to_string(),
            ));
        }
        if self.pre_filter_media_cap > self.pre_filter_total_cap {
            return Err(PipelineError::Configuration(
                "PRE_FILTER_MEDIA_CAP cannot exceed PRE_FILTER_TOTAL_CAP".to_string(),
            ));
        }
        Ok(())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_seconds)
    }

    pub fn collector_timeout(&self) -> Duration {
        Duration::from_secs(self.collector_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }
}

fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
