//! Configuration for the Deepgram live transcription client.

use std::time::Duration;

use url::Url;

use crate::core::stt::base::{STTConfig, STTError};

/// Default Deepgram live transcription endpoint.
pub const DEEPGRAM_STT_URL: &str = "wss://api.deepgram.com/v1/listen";

/// Deepgram closes idle streams after roughly 10 seconds without data.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(8);

/// Provider-specific settings for [`super::DeepgramSTT`].
#[derive(Debug, Clone)]
pub struct DeepgramSTTConfig {
    pub api_key: String,
    /// WebSocket endpoint, overridable for self-hosted deployments and tests.
    pub base_url: String,
    pub keepalive_interval: Duration,
}

impl DeepgramSTTConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEEPGRAM_STT_URL.to_string(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the listen URL with the stream's audio profile as query parameters.
    pub fn build_websocket_url(&self, profile: &STTConfig) -> Result<String, STTError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            STTError::ConfigurationError(format!("Invalid Deepgram URL '{}': {e}", self.base_url))
        })?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(STTError::ConfigurationError(format!(
                "Deepgram URL must use ws:// or wss://, got '{}'",
                url.scheme()
            )));
        }

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("encoding", &profile.encoding)
                .append_pair("sample_rate", &profile.sample_rate.to_string())
                .append_pair("channels", &profile.channels.to_string())
                .append_pair("model", &profile.model)
                .append_pair("punctuate", bool_str(profile.punctuation))
                .append_pair("interim_results", bool_str(profile.interim_results))
                .append_pair("endpointing", &profile.endpointing_ms.to_string())
                .append_pair("utterance_end_ms", &profile.utterance_end_ms.to_string());
            if let Some(language) = &profile.language {
                query.append_pair("language", language);
            }
        }

        Ok(url.into())
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_websocket_url_with_telephony_profile() {
        let config = DeepgramSTTConfig::new("key");
        let url = config.build_websocket_url(&STTConfig::default()).unwrap();

        assert!(url.starts_with("wss://api.deepgram.com/v1/listen?"));
        assert!(url.contains("encoding=mulaw"));
        assert!(url.contains("sample_rate=8000"));
        assert!(url.contains("channels=1"));
        assert!(url.contains("model=nova"));
        assert!(url.contains("punctuate=true"));
        assert!(url.contains("interim_results=true"));
        assert!(url.contains("endpointing=200"));
        assert!(url.contains("utterance_end_ms=1000"));
        assert!(!url.contains("language="));
    }

    #[test]
    fn test_build_websocket_url_with_language() {
        let config = DeepgramSTTConfig::new("key").with_base_url("ws://127.0.0.1:9000/v1/listen");
        let profile = STTConfig {
            language: Some("en-US".to_string()),
            endpointing_ms: 1000,
            ..Default::default()
        };
        let url = config.build_websocket_url(&profile).unwrap();

        assert!(url.starts_with("ws://127.0.0.1:9000/v1/listen?"));
        assert!(url.contains("language=en-US"));
        assert!(url.contains("endpointing=1000"));
    }

    #[test]
    fn test_build_websocket_url_rejects_http_scheme() {
        let config = DeepgramSTTConfig::new("key").with_base_url("https://api.deepgram.com/v1/listen");
        let result = config.build_websocket_url(&STTConfig::default());
        assert!(matches!(result, Err(STTError::ConfigurationError(_))));
    }

    #[test]
    fn test_build_websocket_url_rejects_garbage() {
        let config = DeepgramSTTConfig::new("key").with_base_url("not a url");
        assert!(config.build_websocket_url(&STTConfig::default()).is_err());
    }
}
