//! WebSocket mock for Deepgram live transcription
//!
//! Every accepted connection is handed to the test as a [`ListenConnection`],
//! which counts received audio and lets the test push transcripts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// One live listen socket as seen by the mock.
pub struct ListenConnection {
    outbound: mpsc::UnboundedSender<Message>,
    audio_bytes: Arc<AtomicUsize>,
    audio_chunks: Arc<AtomicUsize>,
}

impl ListenConnection {
    /// Send a final result for `transcript`.
    pub fn send_final(&self, transcript: &str) {
        let results = json!({
            "type": "Results",
            "channel_index": [0, 1],
            "duration": 1.0,
            "start": 0.0,
            "is_final": true,
            "speech_final": true,
            "channel": {
                "alternatives": [{ "transcript": transcript, "confidence": 0.97 }]
            }
        });
        let _ = self.outbound.send(Message::Text(results.to_string().into()));
    }

    /// Send an interim result, which the session must ignore.
    pub fn send_interim(&self, transcript: &str) {
        let results = json!({
            "type": "Results",
            "is_final": false,
            "speech_final": false,
            "channel": {
                "alternatives": [{ "transcript": transcript, "confidence": 0.5 }]
            }
        });
        let _ = self.outbound.send(Message::Text(results.to_string().into()));
    }

    /// Drop the socket from the server side.
    pub fn disconnect(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }

    pub fn audio_bytes(&self) -> usize {
        self.audio_bytes.load(Ordering::Relaxed)
    }

    pub fn audio_chunks(&self) -> usize {
        self.audio_chunks.load(Ordering::Relaxed)
    }

    /// Wait until at least `bytes` of audio have arrived.
    pub async fn wait_for_audio(&self, bytes: usize) -> bool {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.audio_bytes() < bytes {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }
}

/// Mock Deepgram listen server on an ephemeral port.
pub struct MockDeepgramListen {
    pub url: String,
    connections: Mutex<mpsc::UnboundedReceiver<ListenConnection>>,
    accepted: Arc<AtomicUsize>,
}

impl MockDeepgramListen {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock deepgram");
        let addr = listener.local_addr().expect("mock deepgram address");
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                counter.fetch_add(1, Ordering::Relaxed);
                tokio::spawn(serve_connection(ws, conn_tx.clone()));
            }
        });

        Self {
            url: format!("ws://{addr}/v1/listen"),
            connections: Mutex::new(conn_rx),
            accepted,
        }
    }

    /// Next socket opened by a session.
    pub async fn next_connection(&self) -> ListenConnection {
        tokio::time::timeout(Duration::from_secs(5), async {
            self.connections.lock().await.recv().await
        })
        .await
        .expect("timed out waiting for a listen connection")
        .expect("mock deepgram stopped")
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }
}

async fn serve_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    conn_tx: mpsc::UnboundedSender<ListenConnection>,
) {
    let (mut write, mut read) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let audio_bytes = Arc::new(AtomicUsize::new(0));
    let audio_chunks = Arc::new(AtomicUsize::new(0));
    let mut outbound_open = true;

    let metadata = json!({
        "type": "Metadata",
        "request_id": "mock-request",
        "duration": 0.0,
        "channels": 1,
    });
    if write
        .send(Message::Text(metadata.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    let _ = conn_tx.send(ListenConnection {
        outbound: outbound_tx,
        audio_bytes: audio_bytes.clone(),
        audio_chunks: audio_chunks.clone(),
    });

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Binary(data))) => {
                    audio_bytes.fetch_add(data.len(), Ordering::Relaxed);
                    audio_chunks.fetch_add(1, Ordering::Relaxed);
                }
                Some(Ok(Message::Text(text))) => {
                    let kind = serde_json::from_str::<Value>(&text)
                        .ok()
                        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string));
                    if kind.as_deref() == Some("CloseStream") {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            out = outbound_rx.recv(), if outbound_open => match out {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    if write.send(message).await.is_err() || closing {
                        break;
                    }
                }
                None => outbound_open = false,
            },
        }
    }
}
