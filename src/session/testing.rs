//! In-process collaborators for session tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::leads::InMemoryLeadStore;
use super::registry::{Collaborators, SessionSettings};
use crate::core::audio::FRAME_SIZE;
use crate::core::llm::{LLMError, LLMResult, ResponseGenerator};
use crate::core::stt::{RecognitionEvent, RecognitionStream, STTConfig, STTError, SpeechRecognizer};
use crate::core::tts::{SpeechSynthesizer, TTSError, TTSResult};

/// Test side of one opened recognition stream.
pub struct FakeConnection {
    pub audio: mpsc::Receiver<Bytes>,
    pub events: mpsc::Sender<RecognitionEvent>,
}

#[derive(Default)]
pub struct FakeRecognizer {
    connections: Mutex<Vec<Option<FakeConnection>>>,
    failing_opens: AtomicU32,
    audio_capacity: Option<usize>,
}

impl FakeRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognizer whose streams accept at most `capacity` unread chunks.
    pub fn with_audio_capacity(capacity: usize) -> Self {
        Self {
            audio_capacity: Some(capacity),
            ..Default::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn take_connection(&self, index: usize) -> FakeConnection {
        self.connections.lock()[index]
            .take()
            .expect("connection already taken")
    }

    pub fn fail_next_opens(&self, count: u32) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn open(&self, _config: &STTConfig) -> Result<RecognitionStream, STTError> {
        let failing = self.failing_opens.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_opens.store(failing - 1, Ordering::SeqCst);
            return Err(STTError::ConnectionFailed("refused".to_string()));
        }
        let (audio_tx, audio_rx) = mpsc::channel(self.audio_capacity.unwrap_or(1024));
        let (event_tx, event_rx) = mpsc::channel(64);
        self.connections.lock().push(Some(FakeConnection {
            audio: audio_rx,
            events: event_tx,
        }));
        Ok(RecognitionStream::new(audio_tx, event_rx))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Scripted response generator.
pub struct FakeGenerator {
    pub name: Mutex<Option<String>>,
    pub reply: Mutex<LLMResult<String>>,
    pub delay: Mutex<Duration>,
    pub extract_calls: Mutex<Vec<String>>,
    pub reply_calls: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            name: Mutex::new(None),
            reply: Mutex::new(Ok(reply.to_string())),
            delay: Mutex::new(Duration::ZERO),
            extract_calls: Mutex::new(Vec::new()),
            reply_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(self, name: &str) -> Self {
        *self.name.lock() = Some(name.to_string());
        self
    }

    pub fn failing(self) -> Self {
        *self.reply.lock() = Err(LLMError::ProviderError("boom".to_string()));
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = delay;
        self
    }
}

#[async_trait]
impl ResponseGenerator for FakeGenerator {
    async fn reply(&self, transcript: &str) -> LLMResult<String> {
        self.reply_calls.lock().push(transcript.to_string());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.reply.lock().clone()
    }

    async fn extract_name(&self, transcript: &str) -> LLMResult<Option<String>> {
        self.extract_calls.lock().push(transcript.to_string());
        Ok(self.name.lock().clone())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Synthesizer that returns silence, `frames` frames per utterance unless
/// overridden for a given text.
pub struct FakeSynthesizer {
    frames: usize,
    overrides: Mutex<HashMap<String, usize>>,
    failures: Mutex<Vec<String>>,
    pub spoken: Mutex<Vec<String>>,
}

impl FakeSynthesizer {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            overrides: Mutex::new(HashMap::new()),
            failures: Mutex::new(Vec::new()),
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn frames_for(self, text: &str, frames: usize) -> Self {
        self.overrides.lock().insert(text.to_string(), frames);
        self
    }

    pub fn fail_on(self, text: &str) -> Self {
        self.failures.lock().push(text.to_string());
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> TTSResult<Bytes> {
        self.spoken.lock().push(text.to_string());
        if self.failures.lock().iter().any(|t| t == text) {
            return Err(TTSError::ProviderError("synthesis failed".to_string()));
        }
        let frames = self
            .overrides
            .lock()
            .get(text)
            .copied()
            .unwrap_or(self.frames);
        Ok(Bytes::from(vec![0xFF; frames * FRAME_SIZE]))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

pub struct Harness {
    pub recognizer: Arc<FakeRecognizer>,
    pub generator: Arc<FakeGenerator>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub leads: Arc<InMemoryLeadStore>,
}

impl Harness {
    pub fn new(generator: FakeGenerator, synthesizer: FakeSynthesizer) -> Self {
        Self {
            recognizer: Arc::new(FakeRecognizer::new()),
            generator: Arc::new(generator),
            synthesizer: Arc::new(synthesizer),
            leads: Arc::new(InMemoryLeadStore::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            recognizer: self.recognizer.clone(),
            generator: self.generator.clone(),
            synthesizer: self.synthesizer.clone(),
            leads: self.leads.clone(),
        }
    }

    pub fn settings() -> SessionSettings {
        SessionSettings {
            collaborator_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }
}
