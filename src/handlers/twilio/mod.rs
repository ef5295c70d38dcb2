//! Twilio media stream handling.

mod handler;
pub mod messages;

pub use handler::media_stream_handler;
pub use messages::{StartPayload, TwilioMessage};
