//! Wire audio codec for Twilio media streams.
//!
//! Twilio carries 8 kHz mono G.711 mu-law audio as base64 text inside JSON
//! `media` events. Decoding yields the raw mu-law bytes expected by the
//! recognizer; encoding turns synthesized mu-law back into a wire payload.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Audio Profile
// =============================================================================

/// Sample rate negotiated with the telephony transport.
pub const SAMPLE_RATE: u32 = 8000;

/// Number of audio channels on the wire.
pub const CHANNELS: u16 = 1;

/// Encoding name as understood by Deepgram.
pub const ENCODING: &str = "mulaw";

/// One frame is 160 one-byte samples, i.e. 20 ms at 8 kHz.
pub const FRAME_SIZE: usize = 160;

/// Real-time duration of a single frame.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Errors produced by the wire codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

// =============================================================================
// Wire <-> Raw
// =============================================================================

/// Decode a base64 wire payload into raw mu-law bytes.
pub fn decode(wire_frame: &str) -> CodecResult<Bytes> {
    STANDARD
        .decode(wire_frame.trim())
        .map(Bytes::from)
        .map_err(|e| CodecError::MalformedFrame(e.to_string()))
}

/// Encode raw mu-law bytes as a base64 wire payload.
pub fn encode(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

/// Number of frames a buffer of `len` bytes splits into.
pub fn frame_count(len: usize) -> usize {
    len.div_ceil(FRAME_SIZE)
}
