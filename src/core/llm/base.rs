use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by response-generation providers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LLMError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Empty response from model")]
    EmptyResponse,
    #[error("Generation timed out after {0}ms")]
    Timeout(u64),
}

pub type LLMResult<T> = Result<T, LLMError>;

/// Chat-completion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMConfig {
    pub api_key: String,
    pub model: String,
    /// API root without the `/v1/...` path.
    pub base_url: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Produces the assistant's side of the conversation.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Free-form reply to what the caller said.
    async fn reply(&self, transcript: &str) -> LLMResult<String>;

    /// Structured name extraction.
    ///
    /// `Ok(None)` means the model found no name or returned output that
    /// could not be interpreted.
    async fn extract_name(&self, transcript: &str) -> LLMResult<Option<String>>;

    fn provider_name(&self) -> &'static str;
}
