//! Error taxonomy shared by every pipeline stage.
//!
//! Collection and pre-filtering recover locally (empty result, log, continue);
//! only unrecoverable stage failures travel up to the orchestrator, and even
//! then they abort a single event run rather than the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid credentials/settings. Disables a channel for the run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Timeout, connection failure or non-success HTTP status.
    #[error("transport error: {0}")]
    Transport(String),

    /// A provider answered with something we could not decode.
    #[error("parse error: {0}")]
    Parse(String),

    /// The language model returned nothing usable, or could not be reached.
    #[error("model response error: {0}")]
    ModelResponse(String),

    /// The event store could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// True for errors that only disable one channel and never abort a run.
    pub fn is_channel_local(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration(_) | PipelineError::Transport(_) | PipelineError::Parse(_)
        )
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        // The url may carry credentials in its query string
        let err = err.without_url();
        if err.is_decode() {
            PipelineError::Parse(err.to_string())
        } else {
            PipelineError::Transport(err.to_string())
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
