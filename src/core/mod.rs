pub mod audio;
pub mod llm;
pub mod stt;
pub mod transport;
pub mod tts;

// Re-export commonly used types for convenience
pub use audio::{AudioPlayer, CodecError, PlaybackOutcome};

pub use llm::{LLMConfig, LLMError, LLMResult, OpenAIChat, ResponseGenerator};

pub use stt::{
    DeepgramSTT, DeepgramSTTConfig, ReconnectionConfig, RecognitionEvent, RecognitionStream,
    STTConfig, STTError, STTResult, SpeechRecognizer,
};

pub use transport::{
    ChannelTransport, MediaTransport, MessageRoute, OutboundMessage, TransportError,
    TransportResult,
};

pub use tts::{DeepgramTTS, SpeechSynthesizer, TTSConfig, TTSError, TTSResult};
