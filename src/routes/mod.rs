pub mod api;
pub mod twilio;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// All application routes bound to `state`.
pub fn create_app(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(twilio::create_twilio_router(state.clone()))
        .with_state(state)
}
