//! papyrus-ai: chat model layer
//!
//! Message and tool types shared by the agent, plus a streaming client for
//! OpenAI-compatible chat-completions endpoints (Ollama, OpenAI, Groq,
//! OpenRouter or any self-hosted server speaking the same protocol).

pub mod error;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::MessageEventStream;
pub use types::*;
