//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check and call management
//! - `twilio` - Twilio media stream WebSocket
//! - `webhooks` - Twilio voice and call status webhooks

pub mod api;
pub mod twilio;
pub mod webhooks;

pub use twilio::media_stream_handler;
