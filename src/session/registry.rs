//! Registry of live call sessions, keyed by stream id.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, warn};

use super::SessionError;
use super::call::{CallSession, CallStart, SessionState, SessionSummary};
use super::leads::LeadStore;
use crate::core::audio::FRAME_DURATION;
use crate::core::llm::ResponseGenerator;
use crate::core::stt::{ReconnectionConfig, STTConfig, SpeechRecognizer};
use crate::core::transport::MediaTransport;
use crate::core::tts::SpeechSynthesizer;

/// How long shutdown waits for sessions to finish teardown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// External services every call talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub leads: Arc<dyn LeadStore>,
}

/// Per-call tunables.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub stt: STTConfig,
    pub reconnection: ReconnectionConfig,
    /// Audio chunks held while recognition is not ready.
    pub intake_capacity: usize,
    /// Upper bound on each generation and synthesis call.
    pub collaborator_timeout: Duration,
    pub frame_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            stt: STTConfig::default(),
            reconnection: ReconnectionConfig::default(),
            intake_capacity: 500,
            collaborator_timeout: Duration::from_millis(15_000),
            frame_interval: FRAME_DURATION,
        }
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Arc<CallSession>>>,
    collaborators: Collaborators,
    settings: Arc<SessionSettings>,
}

impl SessionRegistry {
    pub fn new(collaborators: Collaborators, settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            collaborators,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Start a session for `start`. A live session with the same stream id
    /// is closed and replaced.
    pub fn open(
        &self,
        start: CallStart,
        transport: Arc<dyn MediaTransport>,
    ) -> Result<Arc<CallSession>, SessionError> {
        let session = CallSession::start(start, transport, self)?;

        if let Some(previous) = self
            .sessions
            .insert(session.session_id().to_string(), session.clone())
        {
            warn!(
                stream_sid = %previous.session_id(),
                "Replacing existing session with the same stream id"
            );
            previous.close();
        }

        // The actor may have torn down before the insert landed
        if matches!(session.state(), SessionState::Closed) {
            self.forget(&session);
        }

        info!(active = self.sessions.len(), "Session registered");
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<CallSession>> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.sessions
            .iter()
            .map(|entry| entry.value().summary())
            .collect()
    }

    /// Close and remove a session. Returns false if it was unknown or
    /// already closing.
    pub fn close(&self, session_id: &str) -> bool {
        match self.get(session_id) {
            Some(session) => self.close_session(&session),
            None => false,
        }
    }

    /// Close `session` and drop it from the registry. A newer session that
    /// reused the stream id is left untouched.
    pub fn close_session(&self, session: &Arc<CallSession>) -> bool {
        let closed = session.close();
        self.forget(session);
        closed
    }

    /// Remove `session` if it is still the registered entry for its id.
    pub(crate) fn forget(&self, session: &Arc<CallSession>) {
        self.sessions
            .remove_if(session.session_id(), |_, current| Arc::ptr_eq(current, session));
    }

    /// Close every session and wait briefly for teardown.
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        if sessions.is_empty() {
            return;
        }

        info!(count = sessions.len(), "Closing active sessions");
        for session in &sessions {
            session.close();
        }

        let teardown = futures::future::join_all(sessions.iter().map(|s| s.wait_closed()));
        if tokio::time::timeout(SHUTDOWN_GRACE, teardown).await.is_err() {
            warn!("Timed out waiting for sessions to close");
        }
        self.sessions.clear();
    }
}
