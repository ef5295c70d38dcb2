//! The per-call session record and its actor task.
//!
//! A session is created from a Twilio `start` message. Its actor owns the
//! recognition bridge: it feeds inbound audio in, turns final transcripts
//! into turn requests, and performs teardown. A separate turn worker speaks
//! replies. Both stop when the session's cancellation token fires.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::SessionError;
use super::bridge::{BridgeEvent, RecognitionBridge};
use super::registry::SessionRegistry;
use super::sequencer::{TurnRequest, TurnSequencer};
use super::turn::TurnWorker;
use crate::core::audio::{AudioPlayer, codec};
use crate::core::transport::MediaTransport;

const AUDIO_BUFFER: usize = 256;

/// Lifecycle of a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Waiting for recognition to become ready.
    Opening,
    Active,
    /// Teardown in progress; inbound audio is refused.
    Closing,
    Closed,
}

/// Identity of a call, taken from the stream's `start` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStart {
    pub stream_sid: String,
    pub call_sid: String,
    pub phone_number: Option<String>,
}

/// Point-in-time view of a session for the API.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub call_id: String,
    pub phone_number: Option<String>,
    pub caller_name: Option<String>,
    pub state: SessionState,
    pub interactions: u64,
    pub duration_secs: u64,
}

pub struct CallSession {
    session_id: String,
    call_id: String,
    phone_number: Option<String>,
    caller_name: OnceLock<String>,
    state: watch::Sender<SessionState>,
    sequencer: TurnSequencer,
    transport: Arc<dyn MediaTransport>,
    audio_tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    started_at: Instant,
}

impl std::fmt::Debug for CallSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("session_id", &self.session_id)
            .field("call_id", &self.call_id)
            .field("state", &self.state())
            .finish()
    }
}

impl CallSession {
    /// Open recognition and spawn the session's actor and turn worker.
    pub(crate) fn start(
        start: CallStart,
        transport: Arc<dyn MediaTransport>,
        registry: &SessionRegistry,
    ) -> Result<Arc<Self>, SessionError> {
        let settings = registry.settings();
        let collaborators = registry.collaborators().clone();

        let bridge = RecognitionBridge::open(
            start.stream_sid.clone(),
            collaborators.recognizer.clone(),
            settings.stt.clone(),
            settings.reconnection.clone(),
            settings.intake_capacity,
        )?;

        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_BUFFER);
        let (state, _) = watch::channel(SessionState::Opening);

        let session = Arc::new(Self {
            session_id: start.stream_sid,
            call_id: start.call_sid,
            phone_number: start.phone_number,
            caller_name: OnceLock::new(),
            state,
            sequencer: TurnSequencer::new(),
            transport,
            audio_tx,
            cancel: CancellationToken::new(),
            started_at: Instant::now(),
        });

        let worker = TurnWorker::new(
            session.clone(),
            collaborators,
            AudioPlayer::new(settings.frame_interval),
            settings.collaborator_timeout,
        );
        tokio::spawn(worker.run());
        tokio::spawn(session.clone().run(bridge, audio_rx, registry.clone()));

        info!(
            stream_sid = %session.session_id,
            call_sid = %session.call_id,
            "Call session started"
        );
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub fn caller_name(&self) -> Option<&str> {
        self.caller_name.get().map(String::as_str)
    }

    /// Record the caller's name. Only the first name sticks.
    pub fn set_caller_name(&self, name: &str) -> bool {
        self.caller_name.set(name.to_string()).is_ok()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn sequencer(&self) -> &TurnSequencer {
        &self.sequencer
    }

    pub fn transport(&self) -> &Arc<dyn MediaTransport> {
        &self.transport
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            call_id: self.call_id.clone(),
            phone_number: self.phone_number.clone(),
            caller_name: self.caller_name().map(str::to_string),
            state: self.state(),
            interactions: self.sequencer.counter(),
            duration_secs: self.elapsed().as_secs(),
        }
    }

    fn accepting(&self) -> bool {
        matches!(self.state(), SessionState::Opening | SessionState::Active)
    }

    /// Queue decoded caller audio for recognition.
    pub async fn push_audio(&self, chunk: Bytes) -> Result<(), SessionError> {
        if !self.accepting() {
            return Err(SessionError::Closed(self.session_id.clone()));
        }
        self.audio_tx
            .send(chunk)
            .await
            .map_err(|_| SessionError::Closed(self.session_id.clone()))
    }

    /// Decode a base64 media payload and queue it. Malformed payloads are
    /// logged and dropped.
    pub async fn receive_media(&self, payload: &str) -> Result<(), SessionError> {
        match codec::decode(payload) {
            Ok(chunk) => self.push_audio(chunk).await,
            Err(e) => {
                warn!(stream_sid = %self.session_id, "Dropping media frame: {}", e);
                Ok(())
            }
        }
    }

    /// Begin teardown. Returns false if the session was already closing.
    pub fn close(&self) -> bool {
        let closing = self.state.send_if_modified(|state| match state {
            SessionState::Opening | SessionState::Active => {
                *state = SessionState::Closing;
                true
            }
            SessionState::Closing | SessionState::Closed => false,
        });
        if closing {
            info!(stream_sid = %self.session_id, "Closing call session");
            self.cancel.cancel();
        }
        closing
    }

    /// Resolve once teardown has finished.
    pub async fn wait_closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }

    async fn run(
        self: Arc<Self>,
        mut bridge: RecognitionBridge,
        mut audio_rx: mpsc::Receiver<Bytes>,
        registry: SessionRegistry,
    ) {
        let mut greeted = false;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                event = bridge.next_event(), if !bridge.is_finished() => match event {
                    Some(BridgeEvent::Ready) if !greeted => {
                        greeted = true;
                        self.state.send_if_modified(|state| {
                            let opening = *state == SessionState::Opening;
                            if opening {
                                *state = SessionState::Active;
                            }
                            opening
                        });
                        self.sequencer.submit(TurnRequest::Greeting);
                    }
                    Some(BridgeEvent::Ready) => {
                        info!(stream_sid = %self.session_id, "Recognition restored");
                    }
                    Some(BridgeEvent::Transcript(text)) => {
                        if self.sequencer.submit(TurnRequest::Transcript(text)) {
                            info!(stream_sid = %self.session_id, "Caller interrupted playback");
                        }
                    }
                    Some(BridgeEvent::NoSpeech) => {
                        debug!(stream_sid = %self.session_id, "Final result without speech");
                    }
                    Some(BridgeEvent::Failed(e)) => {
                        error!(stream_sid = %self.session_id, "Recognition failed, ending call: {}", e);
                        self.close();
                        break;
                    }
                    None => {}
                },

                chunk = audio_rx.recv() => match chunk {
                    Some(chunk) => bridge.push_audio(chunk).await,
                    None => break,
                },
            }
        }

        self.close();
        self.transport.close().await;
        bridge.finish();
        self.sequencer.clear_pending();
        audio_rx.close();

        self.state.send_replace(SessionState::Closed);
        registry.forget(&self);
        info!(
            stream_sid = %self.session_id,
            interactions = self.sequencer.counter(),
            "Call session closed"
        );
    }
}
