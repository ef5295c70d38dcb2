use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional so a file can override only what it needs.
/// Values given here take precedence over environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3000
///   public_host: "caller.example.com"
///
/// providers:
///   deepgram_api_key: "your-deepgram-key"
///   openai_api_key: "your-openai-key"
///   deepgram_stt_url: "wss://api.deepgram.com/v1/listen"
///   deepgram_tts_url: "https://api.deepgram.com/v1/speak"
///   openai_base_url: "https://api.openai.com"
///
/// models:
///   stt: "nova"
///   tts: "aura-luna-en"
///   llm: "gpt-4"
///
/// recognition:
///   endpointing_ms: 200
///   utterance_end_ms: 1000
///   reconnect_max_attempts: 5
///
/// session:
///   intake_queue_capacity: 500
///   collaborator_timeout_ms: 15000
///   max_concurrent_calls: 100
///
/// leads:
///   webhook_url: "https://crm.example.com/leads"
///
/// security:
///   cors_allowed_origins: "https://example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub models: Option<ModelsYaml>,
    pub recognition: Option<RecognitionYaml>,
    pub session: Option<SessionYaml>,
    pub leads: Option<LeadsYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Host name Twilio should dial back to for the media stream
    pub public_host: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Provider credentials and endpoints from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub deepgram_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub deepgram_stt_url: Option<String>,
    pub deepgram_tts_url: Option<String>,
    pub openai_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModelsYaml {
    pub stt: Option<String>,
    pub tts: Option<String>,
    pub llm: Option<String>,
}

/// Speech recognition tuning from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RecognitionYaml {
    pub endpointing_ms: Option<u32>,
    pub utterance_end_ms: Option<u32>,
    pub reconnect_max_attempts: Option<u32>,
}

/// Per-call limits from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub intake_queue_capacity: Option<usize>,
    pub collaborator_timeout_ms: Option<u64>,
    pub max_concurrent_calls: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LeadsYaml {
    pub webhook_url: Option<String>,
}

/// Security configuration from YAML
///
/// # Example YAML structure
/// ```yaml
/// security:
///   cors_allowed_origins: "https://example.com,https://app.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
