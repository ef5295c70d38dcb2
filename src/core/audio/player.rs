//! Real-time paced playback of synthesized audio.
//!
//! A playback batch is split into 20 ms frames which are written to the
//! transport one at a time. Before every frame the player checks that the
//! transport is still open. Ownership of the call's outbound audio is checked
//! once the transport has room for the frame, so a batch that lost ownership
//! while waiting on a full channel never writes another frame or its mark.

use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use super::codec::{self, FRAME_DURATION, FRAME_SIZE};
use crate::core::transport::{MediaTransport, OutboundMessage};

/// How a playback batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every frame was attempted and the completion mark was sent.
    Completed { frames_sent: usize, mark: String },
    /// The transport closed before the batch finished.
    TransportClosed { frames_sent: usize },
    /// A newer turn took ownership of the outbound audio.
    Superseded { frames_sent: usize },
}

impl PlaybackOutcome {
    pub fn frames_sent(&self) -> usize {
        match self {
            Self::Completed { frames_sent, .. }
            | Self::TransportClosed { frames_sent }
            | Self::Superseded { frames_sent } => *frames_sent,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Paces raw mu-law audio onto a media transport.
#[derive(Debug, Clone)]
pub struct AudioPlayer {
    frame_interval: Duration,
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self::new(FRAME_DURATION)
    }
}

impl AudioPlayer {
    pub fn new(frame_interval: Duration) -> Self {
        Self { frame_interval }
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Play `audio` as batch `index`.
    ///
    /// `still_current` is evaluated as each frame and the mark are handed to
    /// the transport; once it returns false nothing more of this batch is sent.
    pub async fn play<F>(
        &self,
        transport: &dyn MediaTransport,
        stream_sid: &str,
        audio: &[u8],
        index: u64,
        still_current: F,
    ) -> PlaybackOutcome
    where
        F: Fn(u64) -> bool + Send + Sync,
    {
        let current = || still_current(index);
        let mut frames_sent = 0;
        debug!(
            stream_sid = %stream_sid,
            interaction = index,
            frames = codec::frame_count(audio.len()),
            "Starting playback"
        );

        for (position, frame) in audio.chunks(FRAME_SIZE).enumerate() {
            if !transport.is_open() {
                debug!(
                    stream_sid = %stream_sid,
                    interaction = index,
                    "Transport closed, stopping audio frame transmission"
                );
                return PlaybackOutcome::TransportClosed { frames_sent };
            }

            let message = OutboundMessage::media(stream_sid, codec::encode(frame));
            match transport.send_if_current(message, &current).await {
                Ok(true) => frames_sent += 1,
                Ok(false) => {
                    debug!(
                        stream_sid = %stream_sid,
                        interaction = index,
                        frames_sent,
                        "Playback superseded by a newer turn"
                    );
                    return PlaybackOutcome::Superseded { frames_sent };
                }
                Err(e) => warn!(
                    stream_sid = %stream_sid,
                    frame = position,
                    "Error sending audio frame: {}",
                    e
                ),
            }

            tokio::time::sleep(self.frame_interval).await;
        }

        if !transport.is_open() {
            return PlaybackOutcome::TransportClosed { frames_sent };
        }

        let mark = Uuid::new_v4().to_string();
        match transport
            .send_if_current(OutboundMessage::mark(stream_sid, mark.clone()), &current)
            .await
        {
            Ok(true) => {}
            Ok(false) => return PlaybackOutcome::Superseded { frames_sent },
            Err(e) => warn!(stream_sid = %stream_sid, "Error sending playback mark: {}", e),
        }

        PlaybackOutcome::Completed { frames_sent, mark }
    }
}
