//! Turn execution: name capture, reply generation, synthesis and playback.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::SessionError;
use super::call::CallSession;
use super::leads::LeadInfo;
use super::registry::Collaborators;
use super::sequencer::TurnRequest;
use crate::core::audio::{AudioPlayer, PlaybackOutcome};
use crate::core::llm::LLMError;
use crate::core::tts::TTSError;

/// Spoken once recognition is ready.
pub const GREETING: &str = "Hello! May I know your name, please?";

/// Spoken when a reply cannot be produced.
pub const APOLOGY: &str = "Sorry, I am unable to process your request at the moment.";

pub fn name_acknowledgement(name: &str) -> String {
    format!("Nice to meet you, {name}. How can I assist you today?")
}

/// Runs turns for one call, one at a time, until the call is cancelled.
pub(crate) struct TurnWorker {
    session: Arc<CallSession>,
    collaborators: Collaborators,
    player: AudioPlayer,
    deadline: Duration,
}

impl TurnWorker {
    pub(crate) fn new(
        session: Arc<CallSession>,
        collaborators: Collaborators,
        player: AudioPlayer,
        deadline: Duration,
    ) -> Self {
        Self {
            session,
            collaborators,
            player,
            deadline,
        }
    }

    pub(crate) async fn run(self) {
        let cancel = self.session.cancel_token().clone();
        let sequencer = self.session.sequencer();

        loop {
            let (index, request) = tokio::select! {
                _ = cancel.cancelled() => break,
                turn = sequencer.next_turn() => turn,
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    sequencer.finish(index);
                    break;
                }
                _ = self.execute(index, request) => {}
            }
        }

        debug!(stream_sid = %self.session.session_id(), "Turn worker stopped");
    }

    async fn execute(&self, index: u64, request: TurnRequest) {
        let sequencer = self.session.sequencer();
        let stream_sid = self.session.session_id();

        let spoken = match request {
            TurnRequest::Greeting => self.synthesize(GREETING).await,
            TurnRequest::Transcript(transcript) => match self.compose(&transcript).await {
                Ok(_) if !sequencer.still_current(index) => {
                    debug!(stream_sid = %stream_sid, interaction = index, "Turn superseded before synthesis");
                    sequencer.finish(index);
                    return;
                }
                Ok(text) => self.synthesize(&text).await,
                Err(e) => Err(e),
            },
        };

        let audio = match spoken {
            Ok(audio) => Some(audio),
            Err(e) => {
                warn!(stream_sid = %stream_sid, interaction = index, "Turn failed: {}", e);
                match self.synthesize(APOLOGY).await {
                    Ok(audio) => Some(audio),
                    Err(e) => {
                        error!(stream_sid = %stream_sid, "Failed to synthesize apology: {}", e);
                        None
                    }
                }
            }
        };

        if let Some(audio) = audio {
            let outcome = self
                .player
                .play(
                    self.session.transport().as_ref(),
                    stream_sid,
                    &audio,
                    index,
                    |i| sequencer.still_current(i),
                )
                .await;
            match &outcome {
                PlaybackOutcome::Completed { frames_sent, mark } => {
                    debug!(stream_sid = %stream_sid, interaction = index, frames_sent, mark = %mark, "Playback complete")
                }
                other => debug!(stream_sid = %stream_sid, interaction = index, "Playback stopped: {:?}", other),
            }
        }

        sequencer.finish(index);
    }

    /// Text to speak for a caller utterance.
    async fn compose(&self, transcript: &str) -> Result<String, SessionError> {
        if self.session.caller_name().is_none() {
            if let Some(name) = self.capture_name(transcript).await {
                return Ok(name_acknowledgement(&name));
            }
        }

        let generator = &self.collaborators.generator;
        match timeout(self.deadline, generator.reply(transcript)).await {
            Ok(reply) => Ok(reply?),
            Err(_) => Err(LLMError::Timeout(self.deadline.as_millis() as u64).into()),
        }
    }

    async fn capture_name(&self, transcript: &str) -> Option<String> {
        let stream_sid = self.session.session_id();
        let generator = &self.collaborators.generator;

        let name = match timeout(self.deadline, generator.extract_name(transcript)).await {
            Ok(Ok(Some(name))) => name,
            Ok(Ok(None)) => {
                debug!(stream_sid = %stream_sid, "No name found in utterance");
                return None;
            }
            Ok(Err(e)) => {
                warn!(stream_sid = %stream_sid, "Name extraction failed: {}", e);
                return None;
            }
            Err(_) => {
                warn!(stream_sid = %stream_sid, "Name extraction timed out");
                return None;
            }
        };

        if !self.session.set_caller_name(&name) {
            return self.session.caller_name().map(str::to_string);
        }
        info!(stream_sid = %stream_sid, "Caller name captured: {}", name);

        let lead = LeadInfo {
            phone_number: self.session.phone_number().map(str::to_string),
            name: name.clone(),
            call_id: self.session.call_id().to_string(),
        };
        let leads = self.collaborators.leads.clone();
        let call_id = self.session.call_id().to_string();
        tokio::spawn(async move {
            if let Err(e) = leads.update_lead(lead).await {
                warn!(call_id = %call_id, "Failed to update lead: {}", e);
            }
        });

        Some(name)
    }

    async fn synthesize(&self, text: &str) -> Result<Bytes, SessionError> {
        let synthesizer = &self.collaborators.synthesizer;
        match timeout(self.deadline, synthesizer.synthesize(text)).await {
            Ok(audio) => Ok(audio?),
            Err(_) => Err(TTSError::Timeout(self.deadline.as_millis() as u64).into()),
        }
    }
}
