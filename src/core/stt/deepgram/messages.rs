//! Deepgram live transcription wire messages.
//!
//! Incoming JSON is tagged by its `type` field. Outgoing control messages use
//! the same shape; audio itself goes out as binary frames.

use serde::{Deserialize, Serialize};

// =============================================================================
// Incoming Messages (Server to Client)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Channel {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

/// Transcription results for a span of audio.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsMessage {
    #[serde(default)]
    pub channel: Channel,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub speech_final: bool,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub duration: f64,
}

impl ResultsMessage {
    /// The top alternative, if the provider sent any.
    pub fn best(&self) -> Option<&Alternative> {
        self.channel.alternatives.first()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataMessage {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub duration: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMessage {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorMessage {
    pub fn text(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Messages received from the Deepgram listen socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum DeepgramMessage {
    Results(ResultsMessage),
    Metadata(MetadataMessage),
    UtteranceEnd {},
    SpeechStarted {},
    Error(ErrorMessage),
    #[serde(other)]
    Unknown,
}

impl DeepgramMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// =============================================================================
// Outgoing Messages (Client to Server)
// =============================================================================

/// Control messages sent as text frames.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Keeps the stream open while no audio flows.
    KeepAlive,
    /// Flush pending audio and close the stream.
    CloseStream,
}

impl ControlMessage {
    pub fn to_json(self) -> String {
        match self {
            Self::KeepAlive => r#"{"type":"KeepAlive"}"#.to_string(),
            Self::CloseStream => r#"{"type":"CloseStream"}"#.to_string(),
        }
    }
}
