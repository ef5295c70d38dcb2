//! Twilio media stream WebSocket handler.
//!
//! Each socket carries one call. The `start` event opens a [`CallSession`],
//! `media` events feed it caller audio and `stop` (or the socket closing)
//! tears it down. Outbound audio and marks flow back through a
//! [`ChannelTransport`] drained by a dedicated writer task.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};

use crate::core::transport::{ChannelTransport, MessageRoute};
use crate::session::CallSession;
use crate::state::{AppState, CallSlot};

use super::messages::TwilioMessage;

/// Outbound queue depth between sessions and the socket writer
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// How often the idle check runs
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// A live call sends media every 20 ms; silence this long means the peer is gone
const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Media stream WebSocket handler
///
/// Upgrades the connection for a Twilio `<Stream>`. The call slot reserved by
/// the call limit middleware is held until the socket finishes.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    slot: Option<Extension<CallSlot>>,
) -> Response {
    info!("Media stream WebSocket upgrade requested");

    let slot = slot.map(|Extension(slot)| slot);
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_socket(socket, state, slot))
}

async fn handle_media_socket(socket: WebSocket, app_state: Arc<AppState>, slot: Option<CallSlot>) {
    info!("Media stream WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (transport, mut route_rx) = ChannelTransport::new(CHANNEL_BUFFER_SIZE);

    let sender_task = tokio::spawn(async move {
        while let Some(route) = route_rx.recv().await {
            let should_close = matches!(route, MessageRoute::Close);

            let result = match route {
                MessageRoute::Outgoing(message) => match message.to_json() {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outbound message: {}", e);
                        continue;
                    }
                },
                MessageRoute::Close => {
                    info!("Closing media stream WebSocket");
                    sender.send(Message::Close(None)).await
                }
            };

            if let Err(e) = result {
                debug!("Failed to write to media stream WebSocket: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    let mut session: Option<Arc<CallSession>> = None;
    let mut last_activity = Instant::now();

    loop {
        select! {
            msg_result = receiver.next() => {
                last_activity = Instant::now();

                match msg_result {
                    Some(Ok(msg)) => {
                        let continue_processing =
                            process_socket_message(msg, &mut session, &transport, &app_state).await;
                        if !continue_processing {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Media stream WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("Media stream WebSocket closed by peer");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep(IDLE_CHECK_INTERVAL) => {
                if last_activity.elapsed() > IDLE_TIMEOUT {
                    warn!(
                        "Media stream idle for {}s, closing stale connection",
                        last_activity.elapsed().as_secs()
                    );
                    break;
                }
            }
        }
    }

    // The peer is gone or done; nothing more should be written
    transport.mark_closed();
    if let Some(session) = session {
        app_state.registry.close_session(&session);
        session.wait_closed().await;
    }
    sender_task.abort();
    drop(slot);

    info!("Media stream WebSocket connection terminated");
}

/// Handle one WebSocket frame. Returns false when the stream should end.
async fn process_socket_message(
    msg: Message,
    session: &mut Option<Arc<CallSession>>,
    transport: &ChannelTransport,
    app_state: &Arc<AppState>,
) -> bool {
    match msg {
        Message::Text(text) => match serde_json::from_str::<TwilioMessage>(&text) {
            Ok(message) => handle_twilio_message(message, session, transport, app_state).await,
            Err(e) => {
                warn!("Failed to parse Twilio message: {}", e);
                true
            }
        },
        Message::Binary(data) => {
            debug!("Ignoring binary frame: {} bytes", data.len());
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!("Media stream close frame received");
            false
        }
    }
}

async fn handle_twilio_message(
    message: TwilioMessage,
    session: &mut Option<Arc<CallSession>>,
    transport: &ChannelTransport,
    app_state: &Arc<AppState>,
) -> bool {
    match message {
        TwilioMessage::Connected { protocol } => {
            debug!(?protocol, "Twilio media stream connected");
            true
        }
        TwilioMessage::Start { start, .. } => {
            if let Some(existing) = session.as_ref() {
                warn!(
                    stream_sid = %existing.session_id(),
                    "Ignoring duplicate start on an active stream"
                );
                return true;
            }

            let call = start.to_call_start();
            info!(
                stream_sid = %call.stream_sid,
                call_sid = %call.call_sid,
                has_phone_number = call.phone_number.is_some(),
                "Media stream started"
            );

            match app_state
                .registry
                .open(call, Arc::new(transport.clone()))
            {
                Ok(opened) => {
                    *session = Some(opened);
                    true
                }
                Err(e) => {
                    error!("Failed to open call session: {}", e);
                    false
                }
            }
        }
        TwilioMessage::Media { media, .. } => {
            if media.track.as_deref().is_some_and(|t| t != "inbound") {
                return true;
            }
            match session.as_ref() {
                Some(session) => {
                    if let Err(e) = session.receive_media(&media.payload).await {
                        debug!("Dropping media: {}", e);
                    }
                }
                None => debug!("Dropping media received before start"),
            }
            true
        }
        TwilioMessage::Mark { mark, .. } => {
            debug!(mark = %mark.name, "Playback mark acknowledged");
            true
        }
        TwilioMessage::Stop { .. } => {
            info!("Media stream stopped");
            false
        }
        TwilioMessage::Dtmf { .. } | TwilioMessage::Unknown => true,
    }
}
