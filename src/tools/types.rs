//! Tool invocation and execution result types
//!
//! A [`ToolInvocation`] is constructed per fragment by the extractor and
//! consumed immediately by the executor; it is never persisted. Arguments
//! are either a JSON mapping (structured, tagged-text and fenced-code
//! encodings) or one opaque string (bare-call fallback).

use crate::errors::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Arguments carried by a tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    /// Parameter-name to value mapping, values loosely typed
    Map(serde_json::Map<String, serde_json::Value>),

    /// Opaque unparsed payload from the bare-call encoding; the target
    /// tool owns the convention for interpreting it
    Raw(String),
}

/// A normalized request to invoke one named tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool name to resolve in the registry
    pub tool: String,

    /// Invocation arguments
    pub arguments: ToolArguments,
}

impl ToolInvocation {
    /// Invocation with named arguments
    pub fn named(tool: impl Into<String>, arguments: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            tool: tool.into(),
            arguments: ToolArguments::Map(arguments),
        }
    }

    /// Invocation carrying a raw bare-call payload
    pub fn raw(tool: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arguments: ToolArguments::Raw(payload.into()),
        }
    }

    /// Serialize the arguments into the single JSON document delivered to
    /// a script tool's input channel.
    ///
    /// A mapping becomes one JSON object; a raw payload is passed through
    /// unchanged for the tool to interpret under its own convention.
    pub fn input_document(&self) -> Result<Vec<u8>> {
        match &self.arguments {
            ToolArguments::Map(map) => serde_json::to_vec(map)
                .map_err(|e| BridgeError::ArgumentEncoding(e.to_string())),
            ToolArguments::Raw(payload) => Ok(payload.clone().into_bytes()),
        }
    }
}

/// Flatten mapping arguments into an ordered sequence of strings for a
/// native callable.
///
/// Key names are discarded and values are taken in the mapping's iteration
/// order. That order is implementation-defined and stable only within a
/// run; native tools with more than one parameter must not attach meaning
/// to argument positions. Scalar values (string, number, boolean) are
/// coerced to strings; null, arrays and objects are a flattening error and
/// the caller falls back to the model's raw text.
pub fn flatten_arguments(arguments: &ToolArguments) -> Result<Vec<String>> {
    match arguments {
        ToolArguments::Raw(payload) => Ok(vec![payload.clone()]),
        ToolArguments::Map(map) => {
            let mut flat = Vec::with_capacity(map.len());
            for (name, value) in map {
                match value {
                    serde_json::Value::String(s) => flat.push(s.clone()),
                    serde_json::Value::Number(n) => flat.push(n.to_string()),
                    serde_json::Value::Bool(b) => flat.push(b.to_string()),
                    other => {
                        return Err(BridgeError::ArgumentEncoding(format!(
                            "parameter '{}' is not a scalar: {}",
                            name, other
                        )))
                    }
                }
            }
            Ok(flat)
        }
    }
}

/// Result of one tool execution
///
/// Owned by the coordinator until written to the client, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Tool name that was executed
    pub tool: String,

    /// Captured output bytes
    pub output: Vec<u8>,

    /// Error message if the execution failed
    pub error: Option<String>,

    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Create successful result
    pub fn success(tool: impl Into<String>, output: Vec<u8>, duration: Duration) -> Self {
        Self {
            tool: tool.into(),
            output,
            error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create failed result
    pub fn failure(tool: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            tool: tool.into(),
            output: Vec::new(),
            error: Some(error.into()),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Whether the execution produced usable output
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
