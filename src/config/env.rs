//! Environment variable loading.
//!
//! Every value is optional here; defaults are applied during merging so
//! YAML can still fill in anything the environment leaves unset.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Raw configuration values read from the environment.
#[derive(Debug, Clone, Default)]
pub(super) struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_host: Option<String>,
    pub tls_enabled: Option<bool>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,

    pub deepgram_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub deepgram_stt_url: Option<String>,
    pub deepgram_tts_url: Option<String>,
    pub openai_base_url: Option<String>,

    pub stt_model: Option<String>,
    pub tts_model: Option<String>,
    pub llm_model: Option<String>,

    pub stt_endpointing_ms: Option<u32>,
    pub stt_utterance_end_ms: Option<u32>,
    pub stt_reconnect_max_attempts: Option<u32>,

    pub intake_queue_capacity: Option<usize>,
    pub collaborator_timeout_ms: Option<u64>,
    pub max_concurrent_calls: Option<usize>,

    pub lead_webhook_url: Option<String>,
    pub cors_allowed_origins: Option<String>,
}

impl EnvConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            host: var("HOST"),
            port: parse("PORT")?,
            public_host: var("PUBLIC_HOST"),
            tls_enabled: parse_bool("TLS_ENABLED")?,
            tls_cert_path: var("TLS_CERT_PATH"),
            tls_key_path: var("TLS_KEY_PATH"),

            deepgram_api_key: var("DEEPGRAM_API_KEY"),
            openai_api_key: var("OPENAI_API_KEY"),
            deepgram_stt_url: var("DEEPGRAM_STT_URL"),
            deepgram_tts_url: var("DEEPGRAM_TTS_URL"),
            openai_base_url: var("OPENAI_BASE_URL"),

            stt_model: var("STT_MODEL"),
            tts_model: var("TTS_MODEL"),
            llm_model: var("LLM_MODEL"),

            stt_endpointing_ms: parse("STT_ENDPOINTING_MS")?,
            stt_utterance_end_ms: parse("STT_UTTERANCE_END_MS")?,
            stt_reconnect_max_attempts: parse("STT_RECONNECT_MAX_ATTEMPTS")?,

            intake_queue_capacity: parse("INTAKE_QUEUE_CAPACITY")?,
            collaborator_timeout_ms: parse("COLLABORATOR_TIMEOUT_MS")?,
            max_concurrent_calls: parse("MAX_CONCURRENT_CALLS")?,

            lead_webhook_url: var("LEAD_WEBHOOK_URL"),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
        })
    }
}

/// Read a variable, treating blank values as unset.
fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: Display,
{
    match var(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: '{raw}' ({e})").into()),
        None => Ok(None),
    }
}

fn parse_bool(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match var(name).map(|v| v.to_lowercase()) {
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes") => Ok(Some(true)),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no") => Ok(Some(false)),
        Some(v) => Err(format!("Invalid value for {name}: '{v}' (expected true or false)").into()),
        None => Ok(None),
    }
}
