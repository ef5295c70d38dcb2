//! Configuration module for the caller server
//!
//! Server configuration comes from .env files, YAML files and environment variables.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_caller::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::llm::LLMConfig;
use crate::core::stt::{ReconnectionConfig, STTConfig};
use crate::core::tts::TTSConfig;
use crate::session::SessionSettings;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains everything needed to run the caller server:
/// - Server settings (host, port, public host, TLS)
/// - Provider API keys and endpoints (Deepgram, OpenAI)
/// - Model selection
/// - Per-call limits and recognition tuning
/// - Lead delivery and CORS
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Host name used in the TwiML stream URL. Falls back to the request's
    /// Host header when unset.
    pub public_host: Option<String>,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Provider API keys
    pub deepgram_api_key: Option<String>,
    pub openai_api_key: Option<String>,

    // Provider endpoints
    pub deepgram_stt_url: String,
    pub deepgram_tts_url: String,
    /// API root for chat completions, without `/v1`
    pub openai_base_url: String,

    // Models
    pub stt_model: String,
    /// Deepgram Aura voice
    pub tts_model: String,
    pub llm_model: String,

    // Recognition tuning
    pub stt_endpointing_ms: u32,
    pub stt_utterance_end_ms: u32,
    /// Reconnection attempts before a call with a lost recognition stream is ended
    pub stt_reconnect_max_attempts: u32,

    // Session limits
    /// Inbound audio chunks held per call while recognition is not ready
    /// Default: 500
    pub intake_queue_capacity: usize,
    /// Deadline for each generation and synthesis call
    /// Default: 15000
    pub collaborator_timeout_ms: u64,
    /// Maximum concurrent calls
    /// Default: None (unlimited)
    pub max_concurrent_calls: Option<usize>,

    // Leads
    /// Leads are POSTed here when set; otherwise they are kept in memory
    pub lead_webhook_url: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
}

/// Zeroize secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.deepgram_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Missing values fall back to defaults. The .env file is loaded in
    /// main.rs before this runs.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_port(self.port)?;
        validation::validate_intake_capacity(self.intake_queue_capacity)?;
        validation::validate_collaborator_timeout(self.collaborator_timeout_ms)?;
        validation::validate_max_concurrent_calls(self.max_concurrent_calls)?;
        validation::validate_lead_webhook(self.lead_webhook_url.as_deref())?;
        validation::validate_endpoint("DEEPGRAM_STT_URL", &self.deepgram_stt_url, &["ws", "wss"])?;
        validation::validate_endpoint(
            "DEEPGRAM_TTS_URL",
            &self.deepgram_tts_url,
            &["http", "https"],
        )?;
        validation::validate_endpoint("OPENAI_BASE_URL", &self.openai_base_url, &["http", "https"])?;
        validation::validate_tls(self.tls.as_ref())?;
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Get API key for a specific provider
    ///
    /// # Returns
    /// * `Result<String, String>` - The API key on success, or an error message on failure
    pub fn get_api_key(&self, provider: &str) -> Result<String, String> {
        match provider.to_lowercase().as_str() {
            "deepgram" => self.deepgram_api_key.as_ref().cloned().ok_or_else(|| {
                "Deepgram API key not configured in server environment".to_string()
            }),
            "openai" => self
                .openai_api_key
                .as_ref()
                .cloned()
                .ok_or_else(|| "OpenAI API key not configured in server environment".to_string()),
            _ => Err(format!("Unsupported provider: {provider}")),
        }
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }

    /// Recognition profile for every call: 8 kHz mono mu-law plus the
    /// configured model and endpointing.
    pub fn stt_config(&self) -> STTConfig {
        STTConfig {
            model: self.stt_model.clone(),
            endpointing_ms: self.stt_endpointing_ms,
            utterance_end_ms: self.stt_utterance_end_ms,
            ..Default::default()
        }
    }

    pub fn tts_config(&self) -> TTSConfig {
        TTSConfig {
            api_key: self.deepgram_api_key.clone().unwrap_or_default(),
            model: self.tts_model.clone(),
            ..Default::default()
        }
    }

    pub fn llm_config(&self) -> LLMConfig {
        LLMConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            model: self.llm_model.clone(),
            base_url: self.openai_base_url.clone(),
            ..Default::default()
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            stt: self.stt_config(),
            reconnection: ReconnectionConfig {
                max_attempts: self.stt_reconnect_max_attempts,
                ..Default::default()
            },
            intake_capacity: self.intake_queue_capacity,
            collaborator_timeout: self.collaborator_timeout(),
            ..Default::default()
        }
    }
}
