//! Deepgram live transcription.

mod client;
mod config;
pub mod messages;

pub use client::DeepgramSTT;
pub use config::{DEEPGRAM_STT_URL, DEFAULT_KEEPALIVE_INTERVAL, DeepgramSTTConfig};
