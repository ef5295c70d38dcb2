//! Twilio voice webhooks.
//!
//! `/twilio-stream` answers an incoming or outbound call with TwiML that
//! connects it to the media stream endpoint. `/call-status` receives Twilio's
//! status callbacks.

use std::sync::Arc;

use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Query parameters accepted by the stream webhook.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    #[serde(rename = "phoneNumber", default)]
    pub phone_number: Option<String>,
}

/// Form fields of a Twilio status callback. Other fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct CallStatusForm {
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus", default)]
    pub call_status: Option<String>,
    #[serde(rename = "CallDuration", default)]
    pub call_duration: Option<String>,
}

/// TwiML that connects the call to `wss://{host}/media`.
pub async fn twiml_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<StreamParams>,
) -> AppResult<Response> {
    let host = match &state.config.public_host {
        Some(host) => host.clone(),
        None => headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Missing Host header".to_string()))?,
    };

    debug!(%host, has_phone_number = params.phone_number.is_some(), "Serving stream TwiML");

    let body = stream_twiml(&host, params.phone_number.as_deref().unwrap_or_default());
    Ok(([(header::CONTENT_TYPE, "text/xml")], body).into_response())
}

/// Log a Twilio call status callback.
pub async fn call_status_handler(Form(form): Form<CallStatusForm>) -> StatusCode {
    info!(
        call_sid = form.call_sid.as_deref().unwrap_or("unknown"),
        call_status = form.call_status.as_deref().unwrap_or("unknown"),
        call_duration = form.call_duration.as_deref().unwrap_or("0"),
        "Call status update"
    );
    StatusCode::OK
}

pub fn stream_twiml(host: &str, phone_number: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<Response><Connect><Stream url="wss://{}/media">"#,
            r#"<Parameter name="phoneNumber" value="{}"/>"#,
            r#"</Stream></Connect></Response>"#
        ),
        xml_escape(host),
        xml_escape(phone_number)
    )
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
