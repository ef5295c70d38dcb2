mod base;
pub mod deepgram;

pub use base::{
    ReconnectionConfig, RecognitionEvent, RecognitionStream, STTConfig, STTError, STTResult,
    SpeechRecognizer,
};
pub use deepgram::{DEEPGRAM_STT_URL, DeepgramSTT, DeepgramSTTConfig};
