//! Streaming speech-to-text abstractions.
//!
//! A [`SpeechRecognizer`] opens one [`RecognitionStream`] per call. The
//! stream is a pair of channels: raw audio goes in, [`RecognitionEvent`]s
//! come out. Opening never blocks on the network; readiness is reported as
//! an event so callers can buffer audio until the provider is listening.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::audio::codec;

/// Errors reported by STT providers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum STTError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Invalid audio format: {0}")]
    InvalidAudioFormat(String),
    #[error("Stream closed")]
    StreamClosed,
}

/// A single transcription result.
#[derive(Debug, Clone, PartialEq)]
pub struct STTResult {
    pub transcript: String,
    /// The provider will not revise this text any further.
    pub is_final: bool,
    /// The provider detected the end of the utterance.
    pub is_speech_final: bool,
    pub confidence: f32,
}

impl STTResult {
    pub fn new(
        transcript: impl Into<String>,
        is_final: bool,
        is_speech_final: bool,
        confidence: f32,
    ) -> Self {
        Self {
            transcript: transcript.into(),
            is_final,
            is_speech_final,
            confidence,
        }
    }
}

/// Audio profile and endpointing parameters for a recognition stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct STTConfig {
    pub model: String,
    pub language: Option<String>,
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub punctuation: bool,
    /// Interim results are requested so endpointing works, then ignored.
    pub interim_results: bool,
    /// Silence in milliseconds after which the provider finalizes an utterance.
    pub endpointing_ms: u32,
    pub utterance_end_ms: u32,
}

impl Default for STTConfig {
    fn default() -> Self {
        Self {
            model: "nova".to_string(),
            language: None,
            encoding: codec::ENCODING.to_string(),
            sample_rate: codec::SAMPLE_RATE,
            channels: codec::CHANNELS,
            punctuation: true,
            interim_results: true,
            endpointing_ms: 200,
            utterance_end_ms: 1000,
        }
    }
}

/// Events emitted by a recognition stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The provider accepted the connection and is ready for audio.
    Ready,
    Result(STTResult),
    Error(STTError),
    /// The connection ended. No further events follow.
    Closed,
}

// =============================================================================
// Recognition Stream
// =============================================================================

/// Per-call handle to a streaming recognition connection.
///
/// Dropping the handle closes the audio channel, which the connection task
/// treats the same as [`RecognitionStream::finish`].
pub struct RecognitionStream {
    audio_tx: Option<mpsc::Sender<Bytes>>,
    events: mpsc::Receiver<RecognitionEvent>,
}

impl RecognitionStream {
    pub fn new(
        audio_tx: mpsc::Sender<Bytes>,
        events: mpsc::Receiver<RecognitionEvent>,
    ) -> Self {
        Self {
            audio_tx: Some(audio_tx),
            events,
        }
    }

    /// Queue audio for the provider, preserving call order.
    pub async fn send_audio(&self, audio: Bytes) -> Result<(), STTError> {
        match &self.audio_tx {
            Some(tx) => tx.send(audio).await.map_err(|_| STTError::StreamClosed),
            None => Err(STTError::StreamClosed),
        }
    }

    /// Signal end of stream. The provider flushes and closes on its own time.
    pub fn finish(&mut self) {
        self.audio_tx.take();
    }

    pub fn is_finished(&self) -> bool {
        self.audio_tx.is_none()
    }

    /// Next event from the provider; `None` once the connection task is gone.
    pub async fn next_event(&mut self) -> Option<RecognitionEvent> {
        self.events.recv().await
    }
}

/// Opens streaming recognition connections.
pub trait SpeechRecognizer: Send + Sync {
    fn open(&self, config: &STTConfig) -> Result<RecognitionStream, STTError>;

    fn provider_name(&self) -> &'static str;
}

// =============================================================================
// Reconnection
// =============================================================================

/// Backoff policy for re-opening a dropped recognition stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectionConfig {
    pub enabled: bool,
    /// Attempts before the call is failed.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f32,
    /// Add up to +/-25% jitter to each delay.
    pub jitter: bool,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ReconnectionConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Delay before attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let delay = self.initial_delay_ms as f64 * (self.backoff_multiplier as f64).powi(exponent);
        let delay = delay.min(self.max_delay_ms as f64);

        let delay = if self.jitter {
            (delay + rand_jitter(delay * 0.25)).max(0.0)
        } else {
            delay
        };
        Duration::from_millis(delay as u64)
    }

    /// Whether attempt number `attempt` (1-based) may run.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && attempt <= self.max_attempts
    }
}

/// Pseudo-random value in `-range..=range` from a clock-seeded LCG.
fn rand_jitter(range: f64) -> f64 {
    use std::time::SystemTime;
    let seed = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let random = (seed.wrapping_mul(1103515245).wrapping_add(12345) % (1 << 31)) as f64;
    let normalized = random / (1u64 << 31) as f64;
    (normalized - 0.5) * 2.0 * range
}
