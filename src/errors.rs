//! Error types for the ollamabridge gateway
//!
//! One crate-wide error enum covering the tool-call pipeline taxonomy:
//! decode, resolution, execution and channel failures are all locally
//! recoverable and degrade to verbatim passthrough of the model's text.
//! Nothing in this enum is process-fatal.

use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A tool-call envelope matched but its body failed to parse
    #[error("Failed to decode tool call payload: {0}")]
    Decode(String),

    /// Tool name not found in the registry
    #[error("Tool not found: {0}")]
    Resolution(String),

    /// A resolved implementation was invoked but failed
    #[error("Tool execution failed: {0}")]
    Execution(String),

    /// Script source file could not be opened
    #[error("Failed to open script file {path}: {reason}")]
    ScriptOpen { path: String, reason: String },

    /// Script ran but the interpreter reported a runtime fault
    #[error("Script runtime error: {0}")]
    ScriptRuntime(String),

    /// Invocation arguments could not be serialized for the tool
    #[error("Failed to encode tool arguments: {0}")]
    ArgumentEncoding(String),

    /// Input/output channel setup for a tool call failed
    #[error("Tool channel setup failed: {0}")]
    Channel(String),

    /// Streaming errors from the backend fragment stream
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// Backend API errors (non-2xx responses, malformed payloads)
    #[error("Ollama API error: {0}")]
    OllamaApi(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication failures
    #[error("Authentication failed: {0}")]
    Auth(String),
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Convert anyhow errors raised in bootstrap code
impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::Resolution("lookup_price".to_string());
        assert!(err.to_string().contains("lookup_price"));
    }

    #[test]
    fn test_script_open_error() {
        let err = BridgeError::ScriptOpen {
            path: "lua-tools/missing.lua".to_string(),
            reason: "No such file".to_string(),
        };
        assert!(err.to_string().contains("lua-tools/missing.lua"));
        assert!(err.to_string().contains("No such file"));
    }
}
