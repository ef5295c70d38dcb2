//! Concurrent call limit for the media stream endpoint
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use waav_caller::middleware::call_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/media", get(media_stream_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         call_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::errors::AppError;
use crate::state::{AppState, CallLimitError};

/// Reserves a call slot for each WebSocket upgrade.
///
/// Returns 503 Service Unavailable when `max_concurrent_calls` is reached.
/// On success the [`crate::state::CallSlot`] is inserted as a request
/// extension; the handler keeps it for the life of the call. Requests that
/// are not upgrades pass through untouched.
pub async fn call_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    match state.try_acquire_call() {
        Ok(slot) => {
            request.extensions_mut().insert(slot);
            next.run(request).await
        }
        Err(CallLimitError::LimitReached { limit }) => {
            tracing::warn!(
                limit,
                active = state.active_call_count(),
                "Rejecting media stream: call limit reached"
            );
            AppError::ServiceUnavailable("Server at capacity. Please try again later.".to_string())
                .into_response()
        }
    }
}
