//! Generic HTTP TTS provider.
//!
//! Providers only describe how to build their HTTP request through
//! [`TTSRequestBuilder`]; [`TTSProvider`] handles validation, execution,
//! status checking and body collection the same way for all of them.

use bytes::Bytes;
use tracing::{debug, warn};

use super::base::{TTSConfig, TTSError, TTSResult, validate_text};

/// Builds the provider-specific HTTP request for a piece of text.
pub trait TTSRequestBuilder: Send + Sync {
    fn build_http_request(&self, client: &reqwest::Client, text: &str) -> reqwest::RequestBuilder;

    fn get_config(&self) -> &TTSConfig;
}

/// Executes TTS requests produced by a [`TTSRequestBuilder`].
pub struct TTSProvider<B: TTSRequestBuilder> {
    client: reqwest::Client,
    builder: B,
}

impl<B: TTSRequestBuilder> TTSProvider<B> {
    pub fn new(client: reqwest::Client, builder: B) -> Self {
        Self { client, builder }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Synthesize `text` and return the full audio body.
    pub async fn generate(&self, text: &str) -> TTSResult<Bytes> {
        let text = validate_text(text)?;
        if self.builder.get_config().api_key.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "API key is not configured".to_string(),
            ));
        }

        let response = self
            .builder
            .build_http_request(&self.client, text)
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("TTS request failed with status {}: {}", status, body);
            return Err(TTSError::ProviderError(format!(
                "TTS generation failed ({status}): {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Failed to read audio: {e}")))?;

        debug!("Received {} bytes of synthesized audio", audio.len());
        Ok(audio)
    }
}
