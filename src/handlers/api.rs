//! Health check and call management endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::session::SessionSummary;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CallList {
    pub count: usize,
    pub calls: Vec<SessionSummary>,
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

/// List active calls.
pub async fn list_calls(State(state): State<Arc<AppState>>) -> Json<CallList> {
    let mut calls = state.registry.summaries();
    calls.sort_by(|a, b| a.session_id.cmp(&b.session_id));
    Json(CallList {
        count: calls.len(),
        calls,
    })
}

/// Hang up a call by stream id.
pub async fn end_call(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<StatusCode> {
    if state.registry.get(&session_id).is_none() {
        return Err(AppError::NotFound(format!("No active call {session_id}")));
    }
    state.registry.close(&session_id);
    info!(stream_sid = %session_id, "Call ended via API");
    Ok(StatusCode::NO_CONTENT)
}
