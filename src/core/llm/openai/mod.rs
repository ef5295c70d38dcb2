//! OpenAI chat-completion response generation.

mod client;
pub mod messages;

pub use client::{DIALOGUE_PROMPT, EXTRACTION_PROMPT, OpenAIChat};
