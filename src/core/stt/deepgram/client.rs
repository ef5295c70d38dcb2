//! Deepgram live transcription WebSocket client.
//!
//! Each call to [`SpeechRecognizer::open`] spawns one connection task that
//! owns the socket:
//!
//! ```text
//! ┌──────────────────┐     ┌────────────────┐     ┌─────────────────┐
//! │ send_audio()     │────▶│ audio (mpsc)   │────▶│ connection task │
//! └──────────────────┘     └────────────────┘     └────────┬────────┘
//!                                                          │
//! ┌──────────────────┐     ┌────────────────┐              │
//! │ next_event()     │◀────│ events (mpsc)  │◀─────────────┘
//! └──────────────────┘     └────────────────┘
//! ```
//!
//! Closing the audio channel is the end-of-stream signal: the task sends
//! `CloseStream`, keeps forwarding results until Deepgram closes the socket
//! (or a grace period expires) and then reports [`RecognitionEvent::Closed`].

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

use super::config::DeepgramSTTConfig;
use super::messages::{ControlMessage, DeepgramMessage};
use crate::core::stt::base::{
    RecognitionEvent, RecognitionStream, STTConfig, STTError, STTResult, SpeechRecognizer,
};

// =============================================================================
// Constants
// =============================================================================

/// Audio chunks buffered between the session and the socket.
const AUDIO_CHANNEL_CAPACITY: usize = 256;

/// Events buffered between the socket and the session.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Per-message idle timeout. Resets after each message from Deepgram.
const WS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for Deepgram to flush after `CloseStream`.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(5);

// =============================================================================
// DeepgramSTT
// =============================================================================

/// Streaming recognizer backed by Deepgram's live transcription API.
#[derive(Debug, Clone)]
pub struct DeepgramSTT {
    config: DeepgramSTTConfig,
}

impl DeepgramSTT {
    pub fn new(config: DeepgramSTTConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeepgramSTTConfig {
        &self.config
    }

    /// Translate one WebSocket message into recognition events.
    ///
    /// # Returns
    /// * `Ok(true)` - Continue processing messages
    /// * `Ok(false)` - The server closed the stream
    pub(crate) fn handle_websocket_message(
        message: Message,
        event_tx: &mpsc::Sender<RecognitionEvent>,
    ) -> Result<bool, STTError> {
        match message {
            Message::Text(text) => match DeepgramMessage::parse(&text) {
                Ok(DeepgramMessage::Results(results)) => {
                    let Some(best) = results.best() else {
                        return Ok(true);
                    };
                    let result = STTResult::new(
                        best.transcript.clone(),
                        results.is_final,
                        results.speech_final,
                        (best.confidence as f32).clamp(0.0, 1.0),
                    );
                    if event_tx.try_send(RecognitionEvent::Result(result)).is_err() {
                        warn!("Failed to forward Deepgram result - channel full or closed");
                    }
                }
                Ok(DeepgramMessage::Metadata(metadata)) => {
                    debug!(
                        request_id = %metadata.request_id,
                        "Deepgram metadata received (duration: {:.2}s)",
                        metadata.duration
                    );
                }
                Ok(DeepgramMessage::UtteranceEnd {}) => debug!("Deepgram utterance end"),
                Ok(DeepgramMessage::SpeechStarted {}) => debug!("Deepgram speech started"),
                Ok(DeepgramMessage::Error(err)) => {
                    let stt_error = STTError::ProviderError(err.text());
                    error!("Deepgram STT error: {}", stt_error);
                    let _ = event_tx.try_send(RecognitionEvent::Error(stt_error));
                }
                Ok(DeepgramMessage::Unknown) => {
                    debug!("Received unknown Deepgram message: {}", text);
                }
                Err(e) => warn!("Failed to parse Deepgram message: {}", e),
            },
            Message::Close(frame) => {
                info!("Deepgram WebSocket closed: {:?}", frame);
                return Ok(false);
            }
            Message::Binary(_) => debug!("Received unexpected binary message from Deepgram"),
            _ => {}
        }
        Ok(true)
    }

    /// Map a handshake failure to the matching error variant.
    fn connect_error(err: tokio_tungstenite::tungstenite::Error) -> STTError {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Http(response)
                if matches!(
                    response.status(),
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
                ) =>
            {
                STTError::AuthenticationFailed(format!(
                    "Deepgram rejected credentials ({})",
                    response.status()
                ))
            }
            other => STTError::ConnectionFailed(format!("Failed to connect to Deepgram: {other}")),
        }
    }

    async fn run_connection(
        url: String,
        api_key: String,
        keepalive_interval: Duration,
        mut audio_rx: mpsc::Receiver<Bytes>,
        event_tx: mpsc::Sender<RecognitionEvent>,
    ) {
        let mut request = match url.as_str().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                let stt_error =
                    STTError::ConnectionFailed(format!("Failed to create WebSocket request: {e}"));
                error!("{}", stt_error);
                let _ = event_tx.send(RecognitionEvent::Error(stt_error)).await;
                let _ = event_tx.send(RecognitionEvent::Closed).await;
                return;
            }
        };
        match HeaderValue::from_str(&format!("Token {api_key}")) {
            Ok(value) => {
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(e) => {
                let stt_error = STTError::ConfigurationError(format!("Invalid API key: {e}"));
                let _ = event_tx.send(RecognitionEvent::Error(stt_error)).await;
                let _ = event_tx.send(RecognitionEvent::Closed).await;
                return;
            }
        }

        let (ws_stream, _response) = match connect_async(request).await {
            Ok(result) => result,
            Err(e) => {
                let stt_error = Self::connect_error(e);
                error!("{}", stt_error);
                let _ = event_tx.send(RecognitionEvent::Error(stt_error)).await;
                let _ = event_tx.send(RecognitionEvent::Closed).await;
                return;
            }
        };

        info!("Connected to Deepgram STT WebSocket");
        if event_tx.send(RecognitionEvent::Ready).await.is_err() {
            return;
        }

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let mut keepalive = tokio::time::interval(keepalive_interval);
        keepalive.tick().await;
        let mut last_audio = Instant::now();
        let mut finishing = false;

        loop {
            tokio::select! {
                audio = audio_rx.recv(), if !finishing => {
                    match audio {
                        Some(audio) => {
                            last_audio = Instant::now();
                            if let Err(e) = ws_sink.send(Message::Binary(audio)).await {
                                let stt_error = STTError::NetworkError(format!(
                                    "Failed to send audio to Deepgram: {e}"
                                ));
                                error!("{}", stt_error);
                                let _ = event_tx.try_send(RecognitionEvent::Error(stt_error));
                                break;
                            }
                        }
                        None => {
                            debug!("Audio channel closed, sending CloseStream to Deepgram");
                            finishing = true;
                            let close = ControlMessage::CloseStream.to_json();
                            if ws_sink.send(Message::Text(close.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                }

                _ = keepalive.tick(), if !finishing => {
                    if last_audio.elapsed() >= keepalive_interval {
                        let ping = ControlMessage::KeepAlive.to_json();
                        if let Err(e) = ws_sink.send(Message::Text(ping.into())).await {
                            warn!("Failed to send KeepAlive to Deepgram: {}", e);
                        }
                    }
                }

                message = timeout(
                    if finishing { CLOSE_GRACE_PERIOD } else { WS_MESSAGE_TIMEOUT },
                    ws_stream.next(),
                ) => {
                    match message {
                        Ok(Some(Ok(msg))) => {
                            match Self::handle_websocket_message(msg, &event_tx) {
                                Ok(true) => {}
                                Ok(false) => break,
                                Err(e) => {
                                    let _ = event_tx.try_send(RecognitionEvent::Error(e));
                                    break;
                                }
                            }
                        }
                        Ok(Some(Err(e))) => {
                            let stt_error = STTError::NetworkError(format!("WebSocket error: {e}"));
                            error!("{}", stt_error);
                            let _ = event_tx.try_send(RecognitionEvent::Error(stt_error));
                            break;
                        }
                        Ok(None) => {
                            info!("Deepgram WebSocket stream ended");
                            break;
                        }
                        Err(_elapsed) => {
                            if finishing {
                                debug!("Deepgram did not close within grace period");
                            } else {
                                let stt_error = STTError::NetworkError(
                                    "WebSocket idle timeout - no message for 60 seconds".into(),
                                );
                                error!("Deepgram STT idle timeout: {}", stt_error);
                                let _ = event_tx.try_send(RecognitionEvent::Error(stt_error));
                            }
                            break;
                        }
                    }
                }
            }
        }

        let _ = ws_sink.send(Message::Close(None)).await;
        let _ = event_tx.send(RecognitionEvent::Closed).await;
        info!("Deepgram STT WebSocket connection closed");
    }
}

impl SpeechRecognizer for DeepgramSTT {
    fn open(&self, profile: &STTConfig) -> Result<RecognitionStream, STTError> {
        if self.config.api_key.is_empty() {
            return Err(STTError::AuthenticationFailed(
                "Deepgram API key is not configured".to_string(),
            ));
        }
        let url = self.config.build_websocket_url(profile)?;

        let (audio_tx, audio_rx) = mpsc::channel::<Bytes>(AUDIO_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<RecognitionEvent>(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(Self::run_connection(
            url,
            self.config.api_key.clone(),
            self.config.keepalive_interval,
            audio_rx,
            event_tx,
        ));

        Ok(RecognitionStream::new(audio_tx, event_rx))
    }

    fn provider_name(&self) -> &'static str {
        "deepgram"
    }
}
