//! Deepgram Speak TTS provider.
//!
//! # API Reference
//!
//! - Endpoint: `POST https://api.deepgram.com/v1/speak`
//! - Auth: `Authorization: Token <key>`
//! - Query: `model`, `encoding`, `container`, `sample_rate`
//! - Body: `{"text": "..."}`
//!
//! Audio is requested as headerless 8 kHz mu-law so it can be streamed to
//! Twilio without transcoding.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use crate::core::tts::base::{SpeechSynthesizer, TTSConfig, TTSError, TTSResult};
use crate::core::tts::provider::{TTSProvider, TTSRequestBuilder};

/// Deepgram Speak API endpoint
pub const DEEPGRAM_TTS_URL: &str = "https://api.deepgram.com/v1/speak";

// =============================================================================
// Request Builder
// =============================================================================

#[derive(Debug, Clone)]
pub struct DeepgramRequestBuilder {
    config: TTSConfig,
    url: String,
}

impl TTSRequestBuilder for DeepgramRequestBuilder {
    fn build_http_request(&self, client: &reqwest::Client, text: &str) -> reqwest::RequestBuilder {
        let sample_rate = self.config.sample_rate.to_string();
        client
            .post(&self.url)
            .query(&[
                ("model", self.config.model.as_str()),
                ("encoding", self.config.audio_format.as_str()),
                ("container", "none"),
                ("sample_rate", sample_rate.as_str()),
            ])
            .header("Authorization", format!("Token {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", format!("audio/{}", self.config.audio_format))
            .json(&json!({ "text": text }))
    }

    fn get_config(&self) -> &TTSConfig {
        &self.config
    }
}

// =============================================================================
// Deepgram TTS Provider
// =============================================================================

/// Deepgram Speak synthesizer.
pub struct DeepgramTTS {
    provider: TTSProvider<DeepgramRequestBuilder>,
}

impl DeepgramTTS {
    pub fn new(client: reqwest::Client, config: TTSConfig) -> TTSResult<Self> {
        Self::with_url(client, config, DEEPGRAM_TTS_URL)
    }

    /// Create a provider pointed at a custom endpoint.
    pub fn with_url(
        client: reqwest::Client,
        config: TTSConfig,
        url: impl Into<String>,
    ) -> TTSResult<Self> {
        let url = url.into();
        reqwest::Url::parse(&url)
            .map_err(|e| TTSError::InvalidConfiguration(format!("Invalid URL '{url}': {e}")))?;
        if config.sample_rate == 0 {
            return Err(TTSError::InvalidConfiguration(
                "Sample rate must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            provider: TTSProvider::new(client, DeepgramRequestBuilder { config, url }),
        })
    }

    pub fn get_provider_info(&self) -> serde_json::Value {
        let config = self.provider.builder().get_config();
        json!({
            "provider": "deepgram",
            "api_type": "HTTP REST",
            "endpoint": self.provider.builder().url,
            "model": config.model,
            "encoding": config.audio_format,
            "sample_rate": config.sample_rate,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for DeepgramTTS {
    async fn synthesize(&self, text: &str) -> TTSResult<Bytes> {
        self.provider.generate(text).await
    }

    fn provider_name(&self) -> &'static str {
        "deepgram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TTSConfig {
        TTSConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_http_request() {
        let builder = DeepgramRequestBuilder {
            config: test_config(),
            url: DEEPGRAM_TTS_URL.to_string(),
        };

        let client = reqwest::Client::new();
        let built = builder
            .build_http_request(&client, "Hello world")
            .build()
            .unwrap();

        let url = built.url();
        assert_eq!(url.path(), "/v1/speak");
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("model".to_string(), "aura-luna-en".to_string())));
        assert!(query.contains(&("encoding".to_string(), "mulaw".to_string())));
        assert!(query.contains(&("container".to_string(), "none".to_string())));
        assert!(query.contains(&("sample_rate".to_string(), "8000".to_string())));

        assert_eq!(built.headers().get("Authorization").unwrap(), "Token test_key");
        assert_eq!(built.headers().get("Accept").unwrap(), "audio/mulaw");

        let body = built.body().and_then(|b| b.as_bytes()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(body, json!({"text": "Hello world"}));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = DeepgramTTS::with_url(reqwest::Client::new(), test_config(), "::nope::");
        assert!(matches!(result, Err(TTSError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_request() {
        // An unroutable URL proves no request is attempted
        let tts = DeepgramTTS::with_url(reqwest::Client::new(), test_config(), "http://127.0.0.1:9/v1/speak")
            .unwrap();
        let result = tts.synthesize("   ").await;
        assert!(matches!(result, Err(TTSError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_missing_api_key_rejected() {
        let tts = DeepgramTTS::new(reqwest::Client::new(), TTSConfig::default()).unwrap();
        let result = tts.synthesize("Hello").await;
        assert!(matches!(result, Err(TTSError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_provider_info() {
        let tts = DeepgramTTS::new(reqwest::Client::new(), test_config()).unwrap();
        let info = tts.get_provider_info();
        assert_eq!(info["provider"], "deepgram");
        assert_eq!(info["model"], "aura-luna-en");
        assert_eq!(info["sample_rate"], 8000);
    }
}
