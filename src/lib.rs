pub mod collectors;
pub mod config;
pub mod db;
pub mod environment;
pub mod error;
pub mod event;
pub mod impact;
pub mod json_repair;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod prefilter;
pub mod prompt;
pub mod query;
pub mod scoring;
pub mod terminology;
pub mod util;

use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::Ollama;
use std::time::Duration;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_PIPELINE: &str = "pipeline";

#[derive(Clone, Debug)]
pub enum LLMClient {
    Ollama(Ollama),
    OpenAI(OpenAIClient<OpenAIConfig>),
}

#[derive(Clone)]
pub struct LLMParams {
    pub llm_client: LLMClient,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-call deadline; an expired call is a transport failure.
    pub timeout: Duration,
}
