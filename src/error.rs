use thiserror::Error;

use crate::config::prompt::PromptError;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned status {status}: {body}")]
    ProviderStatus {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: &'static str },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Conversation '{0}' not found")]
    ConversationNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl AgentError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentError::ConversationNotFound(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            AgentError::InvalidInput(_) | AgentError::Prompt(PromptError::PersonaNotFound(_))
        )
    }
}
