//! Per-call bridge between inbound caller audio and a recognition stream.
//!
//! Audio that arrives before the provider reports ready is held in a bounded
//! intake queue and flushed in arrival order once it does. Only final
//! transcripts leave the bridge. If the provider drops the connection while
//! the call is still live, the bridge re-opens it with backoff and queues
//! audio in the meantime.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::stt::{
    ReconnectionConfig, RecognitionEvent, RecognitionStream, STTConfig, STTError,
    SpeechRecognizer,
};

/// What the session sees from recognition.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The provider is listening. Emitted again after each reconnect.
    Ready,
    /// A finalized utterance with surrounding whitespace removed.
    Transcript(String),
    /// A finalized result that carried no words.
    NoSpeech,
    /// Reconnection gave up; the call cannot continue.
    Failed(STTError),
}

pub struct RecognitionBridge {
    stream_sid: String,
    recognizer: Arc<dyn SpeechRecognizer>,
    config: STTConfig,
    reconnection: ReconnectionConfig,
    stream: Option<RecognitionStream>,
    intake: VecDeque<Bytes>,
    capacity: usize,
    ready: bool,
    /// Ready was received but not yet surfaced; emitted once the intake is flushed.
    ready_pending: bool,
    dropped: u64,
    attempts: u32,
    reconnect_at: Option<Instant>,
    finished: bool,
}

impl RecognitionBridge {
    /// Open the initial recognition stream.
    pub fn open(
        stream_sid: impl Into<String>,
        recognizer: Arc<dyn SpeechRecognizer>,
        config: STTConfig,
        reconnection: ReconnectionConfig,
        capacity: usize,
    ) -> Result<Self, STTError> {
        let stream = recognizer.open(&config)?;
        Ok(Self {
            stream_sid: stream_sid.into(),
            recognizer,
            config,
            reconnection,
            stream: Some(stream),
            intake: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            ready: false,
            ready_pending: false,
            dropped: 0,
            attempts: 0,
            reconnect_at: None,
            finished: false,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn queued(&self) -> usize {
        self.intake.len()
    }

    /// Chunks discarded because the intake queue overflowed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Accept a decoded inbound chunk.
    pub async fn push_audio(&mut self, chunk: Bytes) {
        if self.finished {
            return;
        }
        if self.ready {
            self.drain_intake().await;
        }
        if self.ready && self.intake.is_empty() {
            if let Some(stream) = &self.stream {
                match stream.send_audio(chunk.clone()).await {
                    Ok(()) => return,
                    Err(e) => {
                        debug!(stream_sid = %self.stream_sid, "Recognition stream rejected audio: {}", e);
                        self.ready = false;
                    }
                }
            }
        }
        self.enqueue(chunk);
    }

    fn enqueue(&mut self, chunk: Bytes) {
        if self.intake.len() >= self.capacity {
            self.intake.pop_front();
            self.dropped += 1;
            if self.dropped == 1 || self.dropped % 100 == 0 {
                warn!(
                    stream_sid = %self.stream_sid,
                    dropped = self.dropped,
                    "Audio intake queue full, dropping oldest chunk"
                );
            }
        }
        self.intake.push_back(chunk);
    }

    /// Forward queued audio in arrival order.
    ///
    /// A chunk leaves the queue only after the stream accepted it, so an
    /// interrupted drain resumes where it stopped.
    async fn drain_intake(&mut self) {
        let Some(stream) = &self.stream else {
            return;
        };
        while let Some(chunk) = self.intake.front().cloned() {
            if stream.send_audio(chunk).await.is_err() {
                self.ready = false;
                return;
            }
            self.intake.pop_front();
        }
    }

    /// Wait for the next event worth surfacing to the session.
    ///
    /// Safe to cancel: all progress is kept on `self` between awaits. A
    /// ready notification interrupted mid-flush is surfaced on the next call.
    /// Returns `None` once the bridge is finished or has failed.
    pub async fn next_event(&mut self) -> Option<BridgeEvent> {
        loop {
            if self.finished {
                return None;
            }

            if self.stream.is_none() {
                if let Err(e) = self.reconnect().await {
                    self.finished = true;
                    self.intake.clear();
                    return Some(BridgeEvent::Failed(e));
                }
                continue;
            }

            if self.ready && !self.intake.is_empty() {
                self.drain_intake().await;
            }

            if self.ready_pending {
                self.ready_pending = false;
                return Some(BridgeEvent::Ready);
            }

            let event = match self.stream.as_mut() {
                Some(stream) => stream.next_event().await,
                None => continue,
            };

            match event {
                Some(RecognitionEvent::Ready) => {
                    info!(
                        stream_sid = %self.stream_sid,
                        queued = self.intake.len(),
                        "Recognition ready"
                    );
                    self.ready = true;
                    self.ready_pending = true;
                    self.attempts = 0;
                }
                Some(RecognitionEvent::Result(result)) => {
                    if !result.is_final {
                        continue;
                    }
                    let transcript = result.transcript.trim();
                    if transcript.is_empty() {
                        return Some(BridgeEvent::NoSpeech);
                    }
                    info!(stream_sid = %self.stream_sid, "Transcription: {}", transcript);
                    return Some(BridgeEvent::Transcript(transcript.to_string()));
                }
                Some(RecognitionEvent::Error(e)) => {
                    warn!(stream_sid = %self.stream_sid, "Recognition error: {}", e);
                }
                Some(RecognitionEvent::Closed) | None => {
                    warn!(stream_sid = %self.stream_sid, "Recognition stream closed unexpectedly");
                    self.stream = None;
                    self.ready = false;
                    self.ready_pending = false;
                }
            }
        }
    }

    async fn reconnect(&mut self) -> Result<(), STTError> {
        let deadline = match self.reconnect_at {
            Some(deadline) => deadline,
            None => {
                self.attempts += 1;
                if !self.reconnection.should_retry(self.attempts) {
                    error!(
                        stream_sid = %self.stream_sid,
                        attempts = self.attempts - 1,
                        "Recognition reconnection exhausted"
                    );
                    return Err(STTError::ConnectionFailed(format!(
                        "recognition stream lost after {} reconnection attempts",
                        self.attempts - 1
                    )));
                }
                let delay = self.reconnection.delay_for(self.attempts);
                info!(
                    stream_sid = %self.stream_sid,
                    attempt = self.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling recognition reconnect"
                );
                let deadline = Instant::now() + delay;
                self.reconnect_at = Some(deadline);
                deadline
            }
        };

        tokio::time::sleep_until(deadline).await;
        self.reconnect_at = None;

        match self.recognizer.open(&self.config) {
            Ok(stream) => self.stream = Some(stream),
            Err(e) => warn!(
                stream_sid = %self.stream_sid,
                attempt = self.attempts,
                "Recognition reconnect failed: {}",
                e
            ),
        }
        Ok(())
    }

    /// Signal end of audio and discard anything still queued. Never blocks.
    pub fn finish(&mut self) {
        if self.finished && self.stream.is_none() {
            return;
        }
        self.finished = true;
        self.ready = false;
        self.ready_pending = false;
        self.intake.clear();
        if let Some(mut stream) = self.stream.take() {
            stream.finish();
        }
        debug!(stream_sid = %self.stream_sid, "Recognition bridge finished");
    }
}
