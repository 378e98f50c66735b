//! Chat Relay - streaming proxy from Ollama's chat API to OpenAI-style SSE.
//!
//! Clients post a conversation plus a system prompt. The relay forwards it to
//! a local Ollama `/api/chat` endpoint with streaming enabled and re-emits each
//! newline-delimited JSON record as a `chat.completion.chunk` server-sent
//! event, ending with `data: [DONE]`.
//!
//! Design goals:
//! - One upstream connection per request, nothing shared between requests.
//! - Forward each record as soon as it arrives; never buffer the response.
//! - Report every failure in-band as a single `data: {"error": ...}` frame.

pub mod config;
pub mod error;
pub mod server;
pub mod streaming;
pub mod translation;
pub mod types;
pub mod upstream;

pub use config::RelayConfig;
pub use error::UpstreamError;
pub use server::serve;
pub use streaming::{relay, translate};
pub use types::{ChatMessage, ChatRequest, Frame, Role};
pub use upstream::UpstreamClient;
