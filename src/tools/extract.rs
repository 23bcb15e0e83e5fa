//! Tool-call extraction from model output
//!
//! Models encode tool invocations in several incompatible ways. Four
//! detection modes are tried in fixed priority order, first match wins:
//!
//! 1. Structured `tool_calls` field on the backend fragment
//! 2. Tagged text: `<|tool_call|>[...]<|/tool_call|>` sentinel pair
//! 3. Fenced code: a ```` ```tool ```` block with the same JSON body
//! 4. Bare call: `name(payload)`, optionally wrapped in `print(...)`,
//!    emitted by models that do not honor any structured convention
//!
//! A JSON body inside a matched envelope (modes 2 and 3) that fails to
//! parse falls through to bare-call parsing of the same body. A fragment
//! matching none of the modes is an extraction miss, which is a normal
//! outcome, not an error.

use crate::backend::types::ChatFragment;
use crate::tools::types::ToolInvocation;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// Sentinel-pair envelope: `<|tool_call|>body<|/tool_call|>`, lazy body
static TAGGED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<\|tool_call\|>(.*?)<\|/tool_call\|>").unwrap()
});

/// Fenced envelope: a fence whose label starts with "tool", lazy body
static FENCED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```tool\S*\n(.*?)\n```").unwrap()
});

/// Bare call: `ident(payload)`, optionally wrapped in a print-like call;
/// the payload is captured lazily up to the first close paren
static BARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:print\()?([A-Za-z_][A-Za-z0-9_]*)\((.*?)\)\)?").unwrap()
});

/// Outcome of running the extractor over one fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// One or more invocations, in the order the backend emitted them
    Calls(Vec<ToolInvocation>),

    /// No recognizable tool-call encoding; treat the text as plain content
    Miss,
}

impl Extraction {
    /// Whether extraction produced any invocations
    pub fn is_call(&self) -> bool {
        matches!(self, Extraction::Calls(_))
    }
}

/// Envelope entry shape shared by the tagged-text and fenced-code modes:
/// a JSON array of `{"type": "function", "function": {name, arguments}}`
#[derive(Debug, Deserialize)]
struct EnvelopeCall {
    #[serde(rename = "type", default)]
    _kind: String,

    function: EnvelopeFunction,
}

#[derive(Debug, Deserialize)]
struct EnvelopeFunction {
    name: String,

    #[serde(default)]
    arguments: serde_json::Map<String, serde_json::Value>,
}

/// Run the four detection modes over a backend fragment.
pub fn extract(fragment: &ChatFragment) -> Extraction {
    // Mode 1: the backend's own typed tool-call field, arguments taken
    // as-is (mapping, not flattened)
    if !fragment.message.tool_calls.is_empty() {
        let calls = fragment
            .message
            .tool_calls
            .iter()
            .map(|call| {
                ToolInvocation::named(call.function.name.clone(), call.function.arguments.clone())
            })
            .collect();
        return Extraction::Calls(calls);
    }

    extract_from_text(&fragment.message.content)
}

/// Run the textual detection modes (2-4) over free-form model output.
pub fn extract_from_text(content: &str) -> Extraction {
    if let Some(captures) = TAGGED_RE.captures(content) {
        return decode_envelope_body(&captures[1]);
    }

    if let Some(captures) = FENCED_RE.captures(content) {
        return decode_envelope_body(&captures[1]);
    }

    decode_bare_call(content)
}

/// Decode a matched envelope body as the JSON array shape; on parse
/// failure fall through to bare-call parsing of the same body.
fn decode_envelope_body(body: &str) -> Extraction {
    match serde_json::from_str::<Vec<EnvelopeCall>>(body) {
        Ok(entries) => {
            let calls: Vec<ToolInvocation> = entries
                .into_iter()
                .map(|entry| ToolInvocation::named(entry.function.name, entry.function.arguments))
                .collect();
            if calls.is_empty() {
                Extraction::Miss
            } else {
                Extraction::Calls(calls)
            }
        }
        Err(err) => {
            // Models like gemma3 emit quasi-code instead of JSON here,
            // and phi4-mini is known to misplace the closing brace
            tracing::debug!(error = %err, "envelope body is not valid JSON, trying bare-call parse");
            decode_bare_call(body)
        }
    }
}

/// Decode the bare-call fallback pattern into a single invocation with an
/// opaque payload for the target tool to interpret.
fn decode_bare_call(text: &str) -> Extraction {
    match BARE_RE.captures(text) {
        Some(captures) => Extraction::Calls(vec![ToolInvocation::raw(
            captures[1].to_string(),
            captures[2].to_string(),
        )]),
        None => Extraction::Miss,
    }
}
