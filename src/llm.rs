use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::options::GenerationOptions;
use ollama_rs::generation::parameters::FormatType;
use ollama_rs::Ollama;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{LlmProvider, Settings};
use crate::error::{PipelineError, Result};
use crate::util::strip_thinking_tags;
use crate::{LLMClient, LLMParams, TARGET_LLM_REQUEST};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the backend for a JSON object.
    pub json: bool,
}

impl ChatOptions {
    pub fn text(settings: &Settings) -> Self {
        Self {
            temperature: settings.llm_temperature,
            max_tokens: settings.llm_max_tokens,
            json: false,
        }
    }

    pub fn json(settings: &Settings) -> Self {
        Self {
            json: true,
            ..Self::text(settings)
        }
    }
}

/// A chat-style language model. One call, no retries.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String>;

    fn describe(&self) -> String {
        "chat model".to_string()
    }
}

/// Builds the client for the configured provider.
pub fn build_llm_params(settings: &Settings) -> Result<LLMParams> {
    let (llm_client, model) = match settings.llm_provider {
        LlmProvider::OpenAI => {
            let api_key = settings
                .openai_api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    PipelineError::Configuration("OPENAI_API_KEY is not configured".to_string())
                })?;
            let mut config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(base) = settings.openai_base_url.as_deref().filter(|b| !b.is_empty()) {
                config = config.with_api_base(base);
            }
            (
                LLMClient::OpenAI(OpenAIClient::with_config(config)),
                settings.openai_model.clone(),
            )
        }
        LlmProvider::Ollama => {
            let host = if settings.ollama_host.starts_with("http://")
                || settings.ollama_host.starts_with("https://")
            {
                settings.ollama_host.clone()
            } else {
                format!("http://{}", settings.ollama_host)
            };
            (
                LLMClient::Ollama(Ollama::new(host, settings.ollama_port)),
                settings.ollama_model.clone(),
            )
        }
    };

    Ok(LLMParams {
        llm_client,
        model,
        temperature: settings.llm_temperature,
        max_tokens: settings.llm_max_tokens,
        timeout: settings.llm_timeout(),
    })
}

/// [`ChatModel`] over either backend of [`LLMClient`].
pub struct LlmBackend {
    params: LLMParams,
}

impl LlmBackend {
    pub fn new(params: LLMParams) -> Self {
        Self { params }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let params = build_llm_params(settings)?;
        info!(
            target: TARGET_LLM_REQUEST,
            "Using {} model {}",
            provider_name(&params.llm_client),
            params.model
        );
        Ok(Self::new(params))
    }

    pub fn params(&self) -> &LLMParams {
        &self.params
    }

    async fn openai_chat(
        &self,
        client: &OpenAIClient<OpenAIConfig>,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String> {
        let mut request_messages: Vec<ChatCompletionRequestMessage> = Vec::new();
        for message in messages {
            let built: std::result::Result<ChatCompletionRequestMessage, _> = match message.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(message.content.as_str())
                    .build()
                    .map(Into::into),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.as_str())
                    .build()
                    .map(Into::into),
            };
            request_messages.push(built.map_err(|e| PipelineError::ModelResponse(e.to_string()))?);
        }

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(self.params.model.as_str())
            .messages(request_messages)
            .temperature(options.temperature)
            .max_tokens(options.max_tokens);
        if options.json {
            builder.response_format(ResponseFormat::JsonObject);
        }
        let request = builder
            .build()
            .map_err(|e| PipelineError::ModelResponse(e.to_string()))?;

        let response = match timeout(self.params.timeout, client.chat().create(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(PipelineError::Transport(format!("OpenAI request failed: {}", e))),
            Err(_) => return Err(timed_out(self.params.timeout)),
        };

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PipelineError::ModelResponse("OpenAI returned no content".to_string()))
    }

    async fn ollama_chat(
        &self,
        ollama: &Ollama,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String> {
        // generate takes a single prompt; system text leads
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut request = GenerationRequest::new(self.params.model.clone(), prompt);
        request.options = Some(
            GenerationOptions::default()
                .temperature(options.temperature)
                .num_predict(i32::try_from(options.max_tokens).unwrap_or(i32::MAX)),
        );
        if options.json {
            request.format = Some(FormatType::Json);
        }

        match timeout(self.params.timeout, ollama.generate(request)).await {
            Ok(Ok(response)) => Ok(response.response),
            Ok(Err(e)) => Err(PipelineError::Transport(format!("Ollama request failed: {}", e))),
            Err(_) => Err(timed_out(self.params.timeout)),
        }
    }
}

fn timed_out(after: Duration) -> PipelineError {
    PipelineError::Transport(format!("model request timed out after {:?}", after))
}

fn provider_name(client: &LLMClient) -> &'static str {
    match client {
        LLMClient::Ollama(_) => "Ollama",
        LLMClient::OpenAI(_) => "OpenAI",
    }
}

#[async_trait]
impl ChatModel for LlmBackend {
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String> {
        let prompt_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        debug!(
            target: TARGET_LLM_REQUEST,
            "Sending {} chars to {} (json={}, max_tokens={})",
            prompt_chars,
            self.params.model,
            options.json,
            options.max_tokens
        );

        let raw = match &self.params.llm_client {
            LLMClient::OpenAI(client) => self.openai_chat(client, messages, options).await,
            LLMClient::Ollama(ollama) => self.ollama_chat(ollama, messages, options).await,
        };
        let raw = raw.map_err(|e| {
            warn!(target: TARGET_LLM_REQUEST, "Model call failed: {}", e);
            e
        })?;

        let text = strip_thinking_tags(&raw);
        if text.is_empty() {
            return Err(PipelineError::ModelResponse(
                "model returned an empty response".to_string(),
            ));
        }
        debug!(target: TARGET_LLM_REQUEST, "Received {} chars", text.chars().count());
        Ok(text)
    }

    fn describe(&self) -> String {
        format!("{} {}", provider_name(&self.params.llm_client), self.params.model)
    }
}
