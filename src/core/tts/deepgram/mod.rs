mod provider;

pub use provider::{DEEPGRAM_TTS_URL, DeepgramRequestBuilder, DeepgramTTS};
