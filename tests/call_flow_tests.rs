//! End-to-end call flow tests
//!
//! A real server is started on an ephemeral port with Deepgram and OpenAI
//! replaced by local mocks. The test plays Twilio: it opens `/media`, sends
//! `start` and `media` events and reads back the agent's audio and marks.

mod mock_providers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use wiremock::MockServer;

use mock_providers::http_mock::{
    mount_extract_name, mount_reply, mount_speak, mount_speak_failure,
};
use mock_providers::websocket_mock::MockDeepgramListen;
use mock_providers::CALLER_NUMBER;

use waav_caller::{
    DeepgramSTT, DeepgramSTTConfig, DeepgramTTS, OpenAIChat, ServerConfig, routes,
    session::{Collaborators, GREETING, InMemoryLeadStore, SessionState},
    state::AppState,
};

const GREETING_FRAMES: usize = 5;

fn test_config(deepgram_url: &str, http_uri: &str, reconnect_attempts: u32) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 3000,
        public_host: None,
        tls: None,
        deepgram_api_key: Some("dg-test".to_string()),
        openai_api_key: Some("sk-test".to_string()),
        deepgram_stt_url: deepgram_url.to_string(),
        deepgram_tts_url: format!("{http_uri}/v1/speak"),
        openai_base_url: http_uri.to_string(),
        stt_model: "nova-2-phonecall".to_string(),
        tts_model: "aura-asteria-en".to_string(),
        llm_model: "gpt-4o-mini".to_string(),
        stt_endpointing_ms: 300,
        stt_utterance_end_ms: 1000,
        stt_reconnect_max_attempts: reconnect_attempts,
        intake_queue_capacity: 500,
        collaborator_timeout_ms: 5_000,
        max_concurrent_calls: Some(4),
        lead_webhook_url: None,
        cors_allowed_origins: None,
    }
}

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    leads: Arc<InMemoryLeadStore>,
    deepgram: MockDeepgramListen,
    // Held so the HTTP mocks outlive the test
    _http: MockServer,
}

impl TestServer {
    async fn start(http: MockServer, reconnect_attempts: u32) -> Self {
        let deepgram = MockDeepgramListen::start().await;
        let config = test_config(&deepgram.url, &http.uri(), reconnect_attempts);
        let client = reqwest::Client::new();
        let leads = Arc::new(InMemoryLeadStore::new());

        let collaborators = Collaborators {
            recognizer: Arc::new(DeepgramSTT::new(
                DeepgramSTTConfig::new("dg-test").with_base_url(config.deepgram_stt_url.clone()),
            )),
            generator: Arc::new(OpenAIChat::new(client.clone(), config.llm_config()).unwrap()),
            synthesizer: Arc::new(
                DeepgramTTS::with_url(
                    client.clone(),
                    config.tts_config(),
                    config.deepgram_tts_url.clone(),
                )
                .unwrap(),
            ),
            leads: leads.clone(),
        };

        let state = AppState::with_collaborators(config, collaborators, client);
        let app = routes::create_app(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            leads,
            deepgram,
            _http: http,
        }
    }

    async fn connect(&self) -> TwilioClient {
        let (ws, _) = connect_async(format!("ws://{}/media", self.addr))
            .await
            .expect("media stream upgrade");
        TwilioClient { ws }
    }

    async fn wait_for_sessions(&self, expected: usize) -> bool {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.state.registry.len() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }
}

/// The Twilio side of a media stream.
struct TwilioClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TwilioClient {
    async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .unwrap();
    }

    async fn start(&mut self, stream_sid: &str) {
        self.send_json(json!({"event": "connected", "protocol": "Call", "version": "1.0.0"}))
            .await;
        self.send_json(json!({
            "event": "start",
            "sequenceNumber": "1",
            "streamSid": stream_sid,
            "start": {
                "accountSid": "AC00000000000000000000000000000000",
                "streamSid": stream_sid,
                "callSid": "CA00000000000000000000000000000001",
                "tracks": ["inbound"],
                "customParameters": { "phoneNumber": CALLER_NUMBER },
                "mediaFormat": { "encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1 }
            }
        }))
        .await;
    }

    async fn send_media(&mut self, stream_sid: &str, audio: &[u8]) {
        self.send_json(json!({
            "event": "media",
            "streamSid": stream_sid,
            "media": { "track": "inbound", "chunk": "1", "timestamp": "20", "payload": STANDARD.encode(audio) }
        }))
        .await;
    }

    async fn stop(&mut self, stream_sid: &str) {
        self.send_json(json!({"event": "stop", "streamSid": stream_sid}))
            .await;
    }

    /// Next outbound JSON event, or None if the socket closed.
    async fn next_event(&mut self, wait: Duration) -> Option<Value> {
        loop {
            match tokio::time::timeout(wait, self.ws.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    return Some(serde_json::from_str(&text).unwrap());
                }
                Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) => return None,
                Ok(Some(Ok(_))) => continue,
                Err(_) => panic!("timed out waiting for an outbound event"),
            }
        }
    }

    /// Read one playback batch: media frames followed by its mark.
    async fn read_batch(&mut self, stream_sid: &str) -> (usize, String) {
        let mut frames = 0;
        loop {
            let event = self
                .next_event(Duration::from_secs(5))
                .await
                .expect("socket closed mid-batch");
            assert_eq!(event["streamSid"], stream_sid);
            match event["event"].as_str() {
                Some("media") => {
                    let payload = event["media"]["payload"].as_str().unwrap();
                    assert_eq!(STANDARD.decode(payload).unwrap().len(), 160);
                    frames += 1;
                }
                Some("mark") => {
                    return (frames, event["mark"]["name"].as_str().unwrap().to_string());
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    /// True if nothing arrives within `wait`.
    async fn is_silent(&mut self, wait: Duration) -> bool {
        matches!(tokio::time::timeout(wait, self.ws.next()).await, Err(_))
    }

    /// Wait for the server to close the socket.
    async fn wait_for_close(&mut self) -> bool {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await
        .is_ok()
    }
}

#[tokio::test]
async fn test_full_call_greeting_name_and_reply() {
    let http = MockServer::start().await;
    mount_speak(&http, GREETING_FRAMES).await;
    mount_extract_name(&http, Some("Alex")).await;
    mount_reply(&http, "It will be sunny all week.").await;
    let server = TestServer::start(http, 5).await;

    let mut twilio = server.connect().await;
    twilio.start("MZ100").await;
    let listen = server.deepgram.next_connection().await;

    // Greeting plays as soon as recognition is ready
    let (frames, first_mark) = twilio.read_batch("MZ100").await;
    assert_eq!(frames, GREETING_FRAMES);

    let session = server.state.registry.get("MZ100").unwrap();
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.phone_number(), Some(CALLER_NUMBER));

    // Caller audio reaches Deepgram unchanged
    for _ in 0..5 {
        twilio.send_media("MZ100", &[0x7Fu8; 160]).await;
    }
    assert!(listen.wait_for_audio(800).await);

    // Interim results are not turns
    listen.send_interim("My na");
    listen.send_final("My name is Alex");
    let (frames, second_mark) = twilio.read_batch("MZ100").await;
    assert_eq!(frames, GREETING_FRAMES);
    assert_ne!(first_mark, second_mark);

    assert_eq!(session.caller_name(), Some("Alex"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let lead = server.leads.get(CALLER_NUMBER).unwrap();
    assert_eq!(lead.name, "Alex");
    assert_eq!(lead.call_id, "CA00000000000000000000000000000001");

    listen.send_final("What's the weather like?");
    let (frames, _) = twilio.read_batch("MZ100").await;
    assert_eq!(frames, GREETING_FRAMES);

    let summary = session.summary();
    assert_eq!(summary.interactions, 3);
    assert_eq!(summary.caller_name.as_deref(), Some("Alex"));

    twilio.stop("MZ100").await;
    assert!(server.wait_for_sessions(0).await);
    session.wait_closed().await;
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_synthesis_failure_keeps_call_alive() {
    let http = MockServer::start().await;
    mount_speak_failure(&http, 503).await;
    mount_reply(&http, "unused").await;
    let server = TestServer::start(http, 5).await;

    let mut twilio = server.connect().await;
    twilio.start("MZ200").await;
    let listen = server.deepgram.next_connection().await;

    // Neither the greeting nor its apology can be synthesized
    assert!(twilio.is_silent(Duration::from_millis(500)).await);

    listen.send_final("Hello?");
    assert!(twilio.is_silent(Duration::from_millis(500)).await);

    let session = server.state.registry.get("MZ200").unwrap();
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.sequencer().counter(), 2);
    assert!(session.caller_name().is_none());
}

#[tokio::test]
async fn test_recognition_reconnects_after_drop() {
    let http = MockServer::start().await;
    mount_speak(&http, 2).await;
    mount_extract_name(&http, None).await;
    mount_reply(&http, "Sure, I can help with that.").await;
    let server = TestServer::start(http, 5).await;

    let mut twilio = server.connect().await;
    twilio.start("MZ300").await;
    let first = server.deepgram.next_connection().await;
    twilio.read_batch("MZ300").await;

    first.disconnect();
    let second = server.deepgram.next_connection().await;
    assert_eq!(server.deepgram.accepted(), 2);

    // The greeting is not replayed after a reconnect
    assert!(twilio.is_silent(Duration::from_millis(300)).await);

    second.send_final("Can you help me?");
    let (frames, _) = twilio.read_batch("MZ300").await;
    assert_eq!(frames, 2);

    twilio.send_media("MZ300", &[0x7Fu8; 320]).await;
    assert!(second.wait_for_audio(320).await);
}

#[tokio::test]
async fn test_recognition_loss_ends_call() {
    let http = MockServer::start().await;
    mount_speak(&http, 1).await;
    let server = TestServer::start(http, 0).await;

    let mut twilio = server.connect().await;
    twilio.start("MZ400").await;
    let listen = server.deepgram.next_connection().await;
    twilio.read_batch("MZ400").await;

    listen.disconnect();
    assert!(twilio.wait_for_close().await);
    assert!(server.wait_for_sessions(0).await);
}

#[tokio::test]
async fn test_hangup_via_api_closes_stream() {
    let http = MockServer::start().await;
    mount_speak(&http, 1).await;
    let server = TestServer::start(http, 5).await;

    let mut twilio = server.connect().await;
    twilio.start("MZ500").await;
    server.deepgram.next_connection().await;
    twilio.read_batch("MZ500").await;

    let response = reqwest::Client::new()
        .delete(format!("http://{}/calls/MZ500", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    assert!(twilio.wait_for_close().await);
    assert!(server.state.registry.get("MZ500").is_none());
}

#[tokio::test]
async fn test_socket_drop_tears_down_session() {
    let http = MockServer::start().await;
    mount_speak(&http, 1).await;
    let server = TestServer::start(http, 5).await;

    let mut twilio = server.connect().await;
    twilio.start("MZ600").await;
    server.deepgram.next_connection().await;
    twilio.read_batch("MZ600").await;

    let session = server.state.registry.get("MZ600").unwrap();
    assert_eq!(server.state.active_call_count(), 1);
    drop(twilio);

    session.wait_closed().await;
    assert!(server.wait_for_sessions(0).await);
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.state.active_call_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("call slot released");
}

#[tokio::test]
async fn test_greeting_text_is_synthesized_first() {
    let http = MockServer::start().await;
    mount_speak(&http, 1).await;
    let server = TestServer::start(http, 5).await;

    let mut twilio = server.connect().await;
    twilio.start("MZ700").await;
    server.deepgram.next_connection().await;
    twilio.read_batch("MZ700").await;

    let requests = server._http.received_requests().await.unwrap();
    let speak = requests
        .iter()
        .find(|r| r.url.path() == "/v1/speak")
        .expect("greeting synthesized");
    let body: Value = serde_json::from_slice(&speak.body).unwrap();
    assert_eq!(body["text"], GREETING);

    let query: Vec<(String, String)> = speak
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert!(query.contains(&("encoding".to_string(), "mulaw".to_string())));
    assert!(query.contains(&("sample_rate".to_string(), "8000".to_string())));
}
