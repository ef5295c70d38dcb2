mod base;
pub mod deepgram;
pub mod provider;

pub use base::{SpeechSynthesizer, TTSConfig, TTSError, TTSResult, validate_text};
pub use deepgram::{DEEPGRAM_TTS_URL, DeepgramTTS};
pub use provider::{TTSProvider, TTSRequestBuilder};
