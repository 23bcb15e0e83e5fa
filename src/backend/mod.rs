//! Ollama backend integration
//!
//! Wire types, incremental fragment decoding and the streaming proxy
//! client. The backend is an external collaborator: the gateway consumes
//! its fragment stream and otherwise proxies it opaquely.

pub mod client;
pub mod parser;
pub mod types;

// Re-export commonly used types
pub use client::{OllamaClient, DEFAULT_OLLAMA_HOST};
pub use parser::FragmentParser;
pub use types::{ChatFragment, ChatMessage, ChatRequest, ToolCall, ToolDescriptor};
