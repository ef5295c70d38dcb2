//! Inbound Twilio Media Streams messages.

use std::collections::HashMap;

use serde::Deserialize;

use crate::session::CallStart;

/// Messages Twilio sends over the media stream WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioMessage {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },
    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        start: StartPayload,
    },
    Media {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        media: MediaPayload,
    },
    Mark {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        mark: MarkPayload,
    },
    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },
    Dtmf {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub stream_sid: String,
    pub call_sid: String,
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
}

/// Informational only; the stream is always 8 kHz mono mu-law.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

impl StartPayload {
    pub fn phone_number(&self) -> Option<&str> {
        self.custom_parameters
            .get("phoneNumber")
            .map(String::as_str)
            .filter(|n| !n.trim().is_empty())
    }

    pub fn to_call_start(&self) -> CallStart {
        CallStart {
            stream_sid: self.stream_sid.clone(),
            call_sid: self.call_sid.clone(),
            phone_number: self.phone_number().map(str::to_string),
        }
    }
}
