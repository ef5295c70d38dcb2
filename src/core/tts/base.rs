use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::audio::codec;

/// Errors reported by TTS providers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TTSError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Synthesis timed out after {0}ms")]
    Timeout(u64),
}

pub type TTSResult<T> = Result<T, TTSError>;

/// Synthesis settings shared by HTTP TTS providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TTSConfig {
    pub api_key: String,
    /// Voice model, e.g. `aura-luna-en`.
    pub model: String,
    pub audio_format: String,
    pub sample_rate: u32,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "aura-luna-en".to_string(),
            audio_format: codec::ENCODING.to_string(),
            sample_rate: codec::SAMPLE_RATE,
        }
    }
}

/// Turns text into raw audio in the call's wire encoding.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`. Empty or whitespace-only text is rejected before
    /// any request is made.
    async fn synthesize(&self, text: &str) -> TTSResult<Bytes>;

    fn provider_name(&self) -> &'static str;
}

/// Reject text that would produce an empty utterance.
pub fn validate_text(text: &str) -> TTSResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TTSError::InvalidInput(
            "Text for TTS cannot be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
