//! Outbound side of the telephony media transport.
//!
//! A [`MediaTransport`] is the handle a call session uses to push audio and
//! marks back to Twilio. The WebSocket handler owns the actual socket and
//! drains a [`MessageRoute`] channel; sessions only ever see the trait.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors surfaced when writing to the transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,
    #[error("Send failed: {0}")]
    SendFailed(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

// =============================================================================
// Outbound Messages
// =============================================================================

/// Media payload carried by an outbound `media` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaPayload {
    pub payload: String,
}

/// Mark payload carried by an outbound `mark` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkPayload {
    pub name: String,
}

/// Messages sent to Twilio over the media stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundMessage {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaPayload,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },
}

impl OutboundMessage {
    pub fn media(stream_sid: &str, payload: String) -> Self {
        Self::Media {
            stream_sid: stream_sid.to_string(),
            media: MediaPayload { payload },
        }
    }

    pub fn mark(stream_sid: &str, name: String) -> Self {
        Self::Mark {
            stream_sid: stream_sid.to_string(),
            mark: MarkPayload { name },
        }
    }

    /// Serialize to the JSON text frame Twilio expects.
    pub fn to_json(&self) -> TransportResult<String> {
        serde_json::to_string(self).map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Write half of a call's media stream.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Whether the underlying connection still accepts messages.
    fn is_open(&self) -> bool;

    /// Queue a message for delivery.
    async fn send(&self, message: OutboundMessage) -> TransportResult<()>;

    /// Queue a message only if `current` still holds once the transport is
    /// able to take it. Returns `Ok(false)` when the message was withheld.
    async fn send_if_current(
        &self,
        message: OutboundMessage,
        current: &(dyn Fn() -> bool + Send + Sync),
    ) -> TransportResult<bool> {
        if !current() {
            return Ok(false);
        }
        self.send(message).await.map(|()| true)
    }

    /// Close the connection. Calling it more than once has no effect.
    async fn close(&self);
}

/// Routed messages for the socket writer task.
#[derive(Debug)]
pub enum MessageRoute {
    Outgoing(OutboundMessage),
    Close,
}

/// Channel-backed transport feeding the WebSocket writer task.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<MessageRoute>,
    open: Arc<AtomicBool>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MessageRoute>) {
        let (tx, rx) = mpsc::channel(capacity);
        let transport = Self {
            tx,
            open: Arc::new(AtomicBool::new(true)),
        };
        (transport, rx)
    }

    /// Mark the transport closed without notifying the writer.
    ///
    /// Used when the peer has already gone away.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }
}

#[async_trait]
impl MediaTransport for ChannelTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    async fn send(&self, message: OutboundMessage) -> TransportResult<()> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.tx
            .send(MessageRoute::Outgoing(message))
            .await
            .map_err(|_| {
                self.mark_closed();
                TransportError::Closed
            })
    }

    async fn send_if_current(
        &self,
        message: OutboundMessage,
        current: &(dyn Fn() -> bool + Send + Sync),
    ) -> TransportResult<bool> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        // Hold a slot first so a wait on a full channel cannot outlive the check
        let permit = self.tx.reserve().await.map_err(|_| {
            self.mark_closed();
            TransportError::Closed
        })?;
        if !current() {
            return Ok(false);
        }
        permit.send(MessageRoute::Outgoing(message));
        Ok(true)
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.tx.send(MessageRoute::Close).await;
        }
    }
}
