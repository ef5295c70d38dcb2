//! OpenAI Chat Completions client.
//!
//! Two request shapes are used per call: a plain dialogue request and a
//! name-extraction request that offers the `extractName` tool.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::messages::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, EXTRACT_NAME_FUNCTION,
    ExtractNameArguments, OpenAIErrorResponse, ResponseMessage, extract_name_tool,
};
use crate::core::llm::base::{LLMConfig, LLMError, LLMResult, ResponseGenerator};

/// System prompt for open conversation turns.
pub const DIALOGUE_PROMPT: &str =
    "You are a friendly AI assistant making a phone call. Keep responses concise and natural.";

/// System prompt for the name-extraction turn.
pub const EXTRACTION_PROMPT: &str =
    "You are a friendly AI assistant making a phone call. Extract names when mentioned in conversation.";

/// Chat-completion backed response generator.
#[derive(Debug, Clone)]
pub struct OpenAIChat {
    client: reqwest::Client,
    config: LLMConfig,
}

impl OpenAIChat {
    pub fn new(client: reqwest::Client, config: LLMConfig) -> LLMResult<Self> {
        reqwest::Url::parse(&config.base_url).map_err(|e| {
            LLMError::ConfigurationError(format!("Invalid base URL '{}': {e}", config.base_url))
        })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_request(&self, system: &str, transcript: &str, extract: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(transcript)],
            tools: extract.then(|| vec![extract_name_tool()]),
            tool_choice: extract.then_some("auto"),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    /// Send a request and return the first choice's message.
    async fn complete(&self, request: &ChatCompletionRequest) -> LLMResult<ResponseMessage> {
        if self.config.api_key.is_empty() {
            return Err(LLMError::ConfigurationError(
                "OpenAI API key is not configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LLMError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map(|err| format!("{} ({})", err.error.message, err.error.error_type))
                .unwrap_or(body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LLMError::AuthenticationFailed(message)
                }
                _ => LLMError::ProviderError(format!("OpenAI API error {status}: {message}")),
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| LLMError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(LLMError::EmptyResponse)
    }
}

/// Pull a usable name out of `extractName` arguments.
fn parse_extracted_name(arguments: &str) -> Option<String> {
    match serde_json::from_str::<ExtractNameArguments>(arguments) {
        Ok(args) => args
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
        Err(e) => {
            warn!("Malformed extractName arguments: {}", e);
            None
        }
    }
}

#[async_trait]
impl ResponseGenerator for OpenAIChat {
    async fn reply(&self, transcript: &str) -> LLMResult<String> {
        let request = self.build_request(DIALOGUE_PROMPT, transcript, false);
        let message = self.complete(&request).await?;

        let content = message
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(LLMError::EmptyResponse)?;

        debug!("Assistant reply: {}", content);
        Ok(content)
    }

    async fn extract_name(&self, transcript: &str) -> LLMResult<Option<String>> {
        let request = self.build_request(EXTRACTION_PROMPT, transcript, true);
        let message = self.complete(&request).await?;

        Ok(message
            .function_arguments(EXTRACT_NAME_FUNCTION)
            .and_then(parse_extracted_name))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
