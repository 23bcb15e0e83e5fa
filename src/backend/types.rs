//! Wire types for the Ollama chat backend
//!
//! Request and fragment shapes for the streaming `/api/chat` endpoint.
//! Tool descriptors declared by operators are carried here verbatim; the
//! backend consumes them read-only and may answer with structured
//! `tool_calls` entries on a message.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single chat message exchanged with the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role: "system", "user", "assistant" or "tool"
    #[serde(default)]
    pub role: String,

    /// Free-form message text
    #[serde(default)]
    pub content: String,

    /// Structured tool calls attached by the backend, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// A structured tool call carried on a backend message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: ToolCallFunction,
}

/// The function half of a structured tool call
///
/// Argument values are loosely typed: string, number or nested structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,

    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

/// Operator-declared tool descriptor, forwarded to the backend as-is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Always "function" for the current backend convention
    #[serde(rename = "type")]
    pub kind: String,

    pub function: ToolFunction,
}

/// Declared function surface of a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parameters: ToolParameters,
}

/// Parameter schema of a declared tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolParameters {
    /// Always "object" for the current backend convention
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Names of required parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Parameter name to specification
    #[serde(default)]
    pub properties: BTreeMap<String, ParameterSpec>,
}

/// Specification of a single declared parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub description: String,

    /// Closed set of allowed values, if the parameter is enumerated
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

/// Chat request forwarded to the backend
///
/// Field set mirrors the backend's `/api/chat` contract; clients post this
/// shape to the gateway and it is relayed with `stream` forced on by the
/// coordinator path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,

    #[serde(default)]
    pub stream: bool,

    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// Response format constraint ("json" or a JSON schema)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Map<String, serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,

    #[serde(default)]
    pub raw: bool,

    /// Declared tool descriptors, consumed read-only by the backend
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,
}

/// One increment of the backend's streamed reply
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatFragment {
    #[serde(default)]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(default)]
    pub message: ChatMessage,

    /// True on the final fragment of a reply
    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
}

impl ChatFragment {
    /// Build a plain text fragment (test and fallback construction)
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            message: ChatMessage {
                role: "assistant".to_string(),
                content: content.into(),
                tool_calls: Vec::new(),
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_deserialization() {
        let json = r#"{"model":"qwen2.5:7b","message":{"role":"assistant","content":"hi"},"done":false}"#;
        let fragment: ChatFragment = serde_json::from_str(json).unwrap();

        assert_eq!(fragment.model, "qwen2.5:7b");
        assert_eq!(fragment.message.content, "hi");
        assert!(!fragment.done);
        assert!(fragment.message.tool_calls.is_empty());
    }

    #[test]
    fn test_fragment_with_tool_calls() {
        let json = r#"{
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "Get_current_weather",
                                  "arguments": {"location": "Paris", "format": "celsius"}}}
                ]
            },
            "done": false
        }"#;
        let fragment: ChatFragment = serde_json::from_str(json).unwrap();

        assert_eq!(fragment.message.tool_calls.len(), 1);
        let call = &fragment.message.tool_calls[0];
        assert_eq!(call.function.name, "Get_current_weather");
        assert_eq!(
            call.function.arguments.get("location").unwrap(),
            &serde_json::json!("Paris")
        );
    }

    #[test]
    fn test_tool_descriptor_round_trip() {
        let json = r#"{
            "type": "function",
            "function": {
                "name": "Get_current_weather",
                "description": "Get the current weather for a location",
                "parameters": {
                    "type": "object",
                    "required": ["location", "format"],
                    "properties": {
                        "location": {"type": "string", "description": "City name"},
                        "format": {"type": "string", "description": "Unit",
                                   "enum": ["celsius", "fahrenheit"]}
                    }
                }
            }
        }"#;
        let descriptor: ToolDescriptor = serde_json::from_str(json).unwrap();

        assert_eq!(descriptor.function.name, "Get_current_weather");
        assert_eq!(descriptor.function.parameters.required.len(), 2);
        let format = descriptor.function.parameters.properties.get("format").unwrap();
        assert_eq!(
            format.allowed_values.as_deref(),
            Some(["celsius".to_string(), "fahrenheit".to_string()].as_slice())
        );

        let back = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(back["type"], "function");
        assert_eq!(back["function"]["parameters"]["properties"]["format"]["enum"][0], "celsius");
    }

    #[test]
    fn test_chat_request_minimal() {
        let json = r#"{"model":"gemma3:12b","stream":true,"messages":[{"role":"user","content":"hello"}]}"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.model, "gemma3:12b");
        assert!(request.stream);
        assert!(request.tools.is_empty());

        // Optional fields are omitted on the wire when unset
        let back = serde_json::to_string(&request).unwrap();
        assert!(!back.contains("keep_alive"));
        assert!(!back.contains("format"));
    }
}
