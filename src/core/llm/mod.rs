mod base;
pub mod openai;

pub use base::{LLMConfig, LLMError, LLMResult, ResponseGenerator};
pub use openai::OpenAIChat;
