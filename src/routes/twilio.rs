//! Twilio-facing routes
//!
//! - `GET|POST /twilio-stream` - TwiML connecting the call to the media stream
//! - `POST /call-status` - call status callbacks
//! - `GET /media` - WebSocket upgrade for the media stream itself
//!
//! The media route is guarded by the concurrent call limit.

use axum::{
    Router, middleware,
    routing::{any, get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{twilio::media_stream_handler, webhooks};
use crate::middleware::call_limit_middleware;
use crate::state::AppState;
use std::sync::Arc;

pub fn create_twilio_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let media = Router::new()
        .route("/media", get(media_stream_handler))
        .route_layer(middleware::from_fn_with_state(state, call_limit_middleware));

    Router::new()
        .route("/twilio-stream", any(webhooks::twiml_handler))
        .route("/call-status", post(webhooks::call_status_handler))
        .merge(media)
        .layer(TraceLayer::new_for_http())
}
