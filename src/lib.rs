//! ollamabridge - Authenticated streaming gateway for local Ollama models
//!
//! Mediates between a web client and an Ollama chat backend, adding
//! authentication, streaming response delivery and interception of tool
//! calls embedded in model output so that named side-effecting functions
//! (native callables or Lua script tools) can be executed and their
//! results substituted into the live stream.
//!
//! # Architecture
//!
//! - **tools**: extractor, registry and executor for tool calls
//! - **backend**: streaming Ollama client and fragment decoding
//! - **relay**: per-request streaming response coordinator
//! - **server/auth**: HTTP surface and the authentication boundary

pub mod errors;
pub mod backend;
pub mod tools;
pub mod relay;

// Re-export commonly used types
pub use errors::{BridgeError, Result};

// HTTP surface and bootstrap glue
pub mod auth;
pub mod cli;
pub mod config;
pub mod server;
