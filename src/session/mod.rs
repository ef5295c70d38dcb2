//! Live call orchestration.
//!
//! Each Twilio media stream gets a [`CallSession`]: recognition is fed
//! through a [`RecognitionBridge`], final transcripts become turns on the
//! session's [`TurnSequencer`], and a turn worker speaks the replies.

mod bridge;
mod call;
pub mod leads;
mod registry;
mod sequencer;
mod turn;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

use crate::core::audio::CodecError;
use crate::core::llm::LLMError;
use crate::core::stt::STTError;
use crate::core::tts::TTSError;

pub use bridge::{BridgeEvent, RecognitionBridge};
pub use call::{CallSession, CallStart, SessionState, SessionSummary};
pub use leads::{InMemoryLeadStore, LeadError, LeadInfo, LeadStore, WebhookLeadStore};
pub use registry::{Collaborators, SessionRegistry, SessionSettings};
pub use sequencer::{TurnRequest, TurnSequencer};
pub use turn::{APOLOGY, GREETING, name_acknowledgement};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Recognition error: {0}")]
    Recognition(#[from] STTError),
    #[error("Generation error: {0}")]
    Generation(#[from] LLMError),
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] TTSError),
    #[error("Malformed media: {0}")]
    Codec(#[from] CodecError),
    #[error("Session {0} is closed")]
    Closed(String),
}
