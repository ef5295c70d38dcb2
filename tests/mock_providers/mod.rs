//! Mock provider servers
//!
//! - WebSocket: Deepgram live transcription (`/v1/listen`)
//! - HTTP (wiremock): Deepgram Speak and OpenAI chat completions

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod http_mock;
pub mod websocket_mock;

/// Standard caller number used across the integration tests.
pub const CALLER_NUMBER: &str = "+15551234567";
