//! Merging of YAML and environment configuration.
//!
//! Priority (highest first): YAML, environment variables, defaults.

use std::path::PathBuf;

use super::env::EnvConfig;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};
use crate::core::llm::LLMConfig;
use crate::core::stt::{DEEPGRAM_STT_URL, ReconnectionConfig, STTConfig};
use crate::core::tts::{DEEPGRAM_TTS_URL, TTSConfig};

pub(super) const DEFAULT_HOST: &str = "0.0.0.0";
pub(super) const DEFAULT_PORT: u16 = 3000;
pub(super) const DEFAULT_INTAKE_QUEUE_CAPACITY: usize = 500;
pub(super) const DEFAULT_COLLABORATOR_TIMEOUT_MS: u64 = 15_000;

/// Build a [`ServerConfig`] from the environment, overridden by `yaml` when given.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();

    let server = yaml.server.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let models = yaml.models.unwrap_or_default();
    let recognition = yaml.recognition.unwrap_or_default();
    let session = yaml.session.unwrap_or_default();
    let leads = yaml.leads.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();
    let tls_yaml = server.tls.unwrap_or_default();

    let stt_defaults = STTConfig::default();
    let tts_defaults = TTSConfig::default();
    let llm_defaults = LLMConfig::default();
    let reconnect_defaults = ReconnectionConfig::default();

    let tls_enabled = tls_yaml.enabled.or(env.tls_enabled).unwrap_or(false);
    let tls = if tls_enabled {
        let cert_path = tls_yaml
            .cert_path
            .or(env.tls_cert_path)
            .ok_or("TLS is enabled but no certificate path (TLS_CERT_PATH) is set")?;
        let key_path = tls_yaml
            .key_path
            .or(env.tls_key_path)
            .ok_or("TLS is enabled but no key path (TLS_KEY_PATH) is set")?;
        Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        })
    } else {
        None
    };

    Ok(ServerConfig {
        host: server
            .host
            .or(env.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: server.port.or(env.port).unwrap_or(DEFAULT_PORT),
        public_host: server.public_host.or(env.public_host),
        tls,

        deepgram_api_key: providers.deepgram_api_key.or(env.deepgram_api_key),
        openai_api_key: providers.openai_api_key.or(env.openai_api_key),
        deepgram_stt_url: providers
            .deepgram_stt_url
            .or(env.deepgram_stt_url)
            .unwrap_or_else(|| DEEPGRAM_STT_URL.to_string()),
        deepgram_tts_url: providers
            .deepgram_tts_url
            .or(env.deepgram_tts_url)
            .unwrap_or_else(|| DEEPGRAM_TTS_URL.to_string()),
        openai_base_url: providers
            .openai_base_url
            .or(env.openai_base_url)
            .unwrap_or(llm_defaults.base_url),

        stt_model: models.stt.or(env.stt_model).unwrap_or(stt_defaults.model),
        tts_model: models.tts.or(env.tts_model).unwrap_or(tts_defaults.model),
        llm_model: models.llm.or(env.llm_model).unwrap_or(llm_defaults.model),

        stt_endpointing_ms: recognition
            .endpointing_ms
            .or(env.stt_endpointing_ms)
            .unwrap_or(stt_defaults.endpointing_ms),
        stt_utterance_end_ms: recognition
            .utterance_end_ms
            .or(env.stt_utterance_end_ms)
            .unwrap_or(stt_defaults.utterance_end_ms),
        stt_reconnect_max_attempts: recognition
            .reconnect_max_attempts
            .or(env.stt_reconnect_max_attempts)
            .unwrap_or(reconnect_defaults.max_attempts),

        intake_queue_capacity: session
            .intake_queue_capacity
            .or(env.intake_queue_capacity)
            .unwrap_or(DEFAULT_INTAKE_QUEUE_CAPACITY),
        collaborator_timeout_ms: session
            .collaborator_timeout_ms
            .or(env.collaborator_timeout_ms)
            .unwrap_or(DEFAULT_COLLABORATOR_TIMEOUT_MS),
        max_concurrent_calls: session.max_concurrent_calls.or(env.max_concurrent_calls),

        lead_webhook_url: leads.webhook_url.or(env.lead_webhook_url),
        cors_allowed_origins: security.cors_allowed_origins.or(env.cors_allowed_origins),
    })
}
