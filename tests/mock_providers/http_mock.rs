//! HTTP mocks for Deepgram Speak and OpenAI chat completions

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Twilio frame size: 20 ms of 8 kHz mu-law.
pub const FRAME_BYTES: usize = 160;

/// Deepgram Speak returning `frames` frames of mu-law silence for any text.
pub async fn mount_speak(server: &MockServer, frames: usize) {
    Mock::given(method("POST"))
        .and(path("/v1/speak"))
        .and(header("authorization", "Token dg-test"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mulaw")
                .set_body_bytes(vec![0xFFu8; frames * FRAME_BYTES]),
        )
        .mount(server)
        .await;
}

/// Deepgram Speak failing with `status`.
pub async fn mount_speak_failure(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/v1/speak"))
        .respond_with(ResponseTemplate::new(status).set_body_string("speak unavailable"))
        .mount(server)
        .await;
}

/// Name extraction requests (the ones offering the `extractName` tool).
pub async fn mount_extract_name(server: &MockServer, name: Option<&str>) {
    let message = match name {
        Some(name) => json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {
                    "name": "extractName",
                    "arguments": json!({ "name": name }).to_string()
                }
            }]
        }),
        None => json!({ "role": "assistant", "content": "No name given." }),
    };

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "tool_choice": "auto" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(message)))
        .with_priority(1)
        .mount(server)
        .await;
}

/// Dialogue replies: any other chat completion.
pub async fn mount_reply(server: &MockServer, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
            "role": "assistant",
            "content": reply
        }))))
        .with_priority(5)
        .mount(server)
        .await;
}

fn completion(message: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }]
    })
}
