//! Streaming response coordinator
//!
//! Owns the chat stream of one inbound request. Each backend fragment is
//! fully handled before the next one is requested: passed through
//! verbatim when it carries plain content, or diverted through the
//! extractor / registry / executor pipeline when it encodes tool calls.
//! Every write is flushed to the client immediately (one channel send per
//! write), so partial output reaches the user with low latency.
//!
//! Failure policy: a tool call is never silently dropped. Decode,
//! resolution, execution and channel failures all degrade to writing the
//! model's original fragment text, and the stream continues.

use crate::backend::types::ChatFragment;
use crate::errors::Result;
use crate::tools::extract::{extract, Extraction};
use crate::tools::registry::ToolRegistry;
use crate::tools::types::ToolInvocation;
use crate::tools::ToolExecutor;
use bytes::Bytes;
use futures_util::Stream;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Coordinator states for one chat request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Created, stream not yet started
    Open,

    /// Passing backend fragments through to the client
    Streaming,

    /// A fragment is diverted through the tool pipeline
    ToolDiverted,

    /// Stream finished, client disconnected or backend failed
    Closed,
}

/// Per-request streaming coordinator
///
/// One instance exists per inbound chat request; the registry is the only
/// state shared across requests and it is read-only.
pub struct RelayCoordinator {
    registry: Arc<ToolRegistry>,
    executor: ToolExecutor,
    state: RelayState,
    request_id: Uuid,
}

impl RelayCoordinator {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            executor: ToolExecutor::new(),
            state: RelayState::Open,
            request_id: Uuid::new_v4(),
        }
    }

    /// Current state
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Request correlation id
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Drive a backend fragment stream to completion, writing chunks into
    /// the client channel.
    ///
    /// Returns `Ok(())` on normal completion and on client disconnect; a
    /// backend stream error is returned after the state moves to
    /// [`RelayState::Closed`]. Dropping the fragment stream on early
    /// return cancels the underlying backend call; an execution already
    /// handed to a blocking thread finishes there and its result is
    /// discarded.
    pub async fn relay<S>(&mut self, mut fragments: S, client: mpsc::Sender<Bytes>) -> Result<()>
    where
        S: Stream<Item = Result<ChatFragment>> + Unpin,
    {
        self.state = RelayState::Streaming;
        tracing::debug!(request_id = %self.request_id, "relay stream opened");

        while let Some(item) = fragments.next().await {
            let fragment = match item {
                Ok(fragment) => fragment,
                Err(err) => {
                    self.state = RelayState::Closed;
                    tracing::warn!(request_id = %self.request_id, error = %err, "backend stream failed");
                    return Err(err);
                }
            };

            if !self.handle_fragment(&fragment, &client).await {
                // Client went away; cancel upstream by dropping the stream
                self.state = RelayState::Closed;
                tracing::debug!(request_id = %self.request_id, "client disconnected, cancelling backend stream");
                return Ok(());
            }

            if fragment.done {
                break;
            }
        }

        self.state = RelayState::Closed;
        tracing::debug!(request_id = %self.request_id, "relay stream closed");
        Ok(())
    }

    /// Handle one fragment: passthrough or tool diversion.
    ///
    /// Returns false when the client channel is gone.
    async fn handle_fragment(
        &mut self,
        fragment: &ChatFragment,
        client: &mpsc::Sender<Bytes>,
    ) -> bool {
        match extract(fragment) {
            Extraction::Miss => {
                self.write_chunk(client, Bytes::from(fragment.message.content.clone()))
                    .await
            }
            Extraction::Calls(invocations) => {
                self.state = RelayState::ToolDiverted;

                // List order is the order the backend emitted; each
                // invocation gets its own write and flush
                for invocation in &invocations {
                    let chunk = self.divert(fragment, invocation).await;
                    if !self.write_chunk(client, chunk).await {
                        return false;
                    }
                }

                self.state = RelayState::Streaming;
                true
            }
        }
    }

    /// Run one invocation through resolve and execute, falling back to
    /// the fragment's original text on any failure.
    async fn divert(&self, fragment: &ChatFragment, invocation: &ToolInvocation) -> Bytes {
        match self.registry.resolve(&invocation.tool) {
            Ok(implementation) => {
                let result = self.executor.execute(implementation, invocation).await;
                if result.is_success() {
                    Bytes::from(result.output)
                } else {
                    Bytes::from(fragment.message.content.clone())
                }
            }
            Err(err) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    tool = %invocation.tool,
                    error = %err,
                    "tool not found, passing model text through"
                );
                Bytes::from(fragment.message.content.clone())
            }
        }
    }

    /// Send one chunk to the client; empty chunks are elided. Returns
    /// false when the receiver is gone.
    async fn write_chunk(&self, client: &mpsc::Sender<Bytes>, chunk: Bytes) -> bool {
        if chunk.is_empty() {
            return true;
        }
        client.send(chunk).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::{ChatMessage, ToolCall, ToolCallFunction};
    use futures_util::stream;

    fn text_fragment(content: &str, done: bool) -> Result<ChatFragment> {
        let mut fragment = ChatFragment::from_content(content);
        fragment.done = done;
        Ok(fragment)
    }

    fn structured_fragment(tool: &str, done: bool) -> Result<ChatFragment> {
        Ok(ChatFragment {
            message: ChatMessage {
                role: "assistant".to_string(),
                content: format!("calling {tool}"),
                tool_calls: vec![ToolCall {
                    function: ToolCallFunction {
                        name: tool.to_string(),
                        arguments: serde_json::Map::new(),
                    },
                }],
            },
            done,
            ..Default::default()
        })
    }

    async fn run_relay(
        registry: ToolRegistry,
        fragments: Vec<Result<ChatFragment>>,
    ) -> (Vec<Bytes>, RelayState) {
        let mut coordinator = RelayCoordinator::new(Arc::new(registry));
        let (tx, mut rx) = mpsc::channel(16);

        let outcome = coordinator
            .relay(stream::iter(fragments), tx)
            .await;
        assert!(outcome.is_ok());

        let mut chunks = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            chunks.push(chunk);
        }
        (chunks, coordinator.state())
    }

    #[tokio::test]
    async fn test_plain_fragments_pass_through_in_order() {
        let (chunks, state) = run_relay(
            ToolRegistry::default(),
            vec![
                text_fragment("The weather ", false),
                text_fragment("is mild.", true),
            ],
        )
        .await;

        assert_eq!(chunks, vec![Bytes::from("The weather "), Bytes::from("is mild.")]);
        assert_eq!(state, RelayState::Closed);
    }

    #[tokio::test]
    async fn test_structured_call_is_executed() {
        let mut registry = ToolRegistry::default();
        registry.register_native(
            "Get_current_weather",
            Box::new(|_: &[String]| Ok("weather:ok".to_string())),
        );

        let (chunks, _) = run_relay(
            registry,
            vec![structured_fragment("Get_current_weather", true)],
        )
        .await;

        assert_eq!(chunks, vec![Bytes::from("weather:ok")]);
    }

    #[tokio::test]
    async fn test_unknown_tool_falls_back_to_model_text() {
        let (chunks, state) = run_relay(
            ToolRegistry::default(),
            vec![
                structured_fragment("no_such_tool", false),
                text_fragment(" and more text", true),
            ],
        )
        .await;

        // Original text passes through and the stream continues
        assert_eq!(
            chunks,
            vec![Bytes::from("calling no_such_tool"), Bytes::from(" and more text")]
        );
        assert_eq!(state, RelayState::Closed);
    }

    #[tokio::test]
    async fn test_failing_tool_falls_back_to_model_text() {
        let mut registry = ToolRegistry::default();
        registry.register_native(
            "broken",
            Box::new(|_: &[String]| Err("backend down".to_string())),
        );

        let (chunks, _) = run_relay(registry, vec![structured_fragment("broken", true)]).await;
        assert_eq!(chunks, vec![Bytes::from("calling broken")]);
    }

    #[tokio::test]
    async fn test_multiple_invocations_write_in_list_order() {
        let mut registry = ToolRegistry::default();
        registry.register_native("alpha", Box::new(|_: &[String]| Ok("A".to_string())));
        registry.register_native("beta", Box::new(|_: &[String]| Ok("B".to_string())));

        let fragment = ChatFragment {
            message: ChatMessage {
                role: "assistant".to_string(),
                content: String::new(),
                tool_calls: ["alpha", "beta"]
                    .iter()
                    .map(|name| ToolCall {
                        function: ToolCallFunction {
                            name: name.to_string(),
                            arguments: serde_json::Map::new(),
                        },
                    })
                    .collect(),
            },
            done: true,
            ..Default::default()
        };

        let (chunks, _) = run_relay(ToolRegistry::default(), vec![Ok(fragment.clone())]).await;
        // Without registrations both fall back to (empty) content
        assert!(chunks.is_empty());

        let (chunks, _) = run_relay(registry, vec![Ok(fragment)]).await;
        assert_eq!(chunks, vec![Bytes::from("A"), Bytes::from("B")]);
    }

    #[tokio::test]
    async fn test_backend_error_closes_stream() {
        let mut coordinator = RelayCoordinator::new(Arc::new(ToolRegistry::default()));
        let (tx, _rx) = mpsc::channel(16);

        let fragments = stream::iter(vec![
            text_fragment("partial", false),
            Err(crate::errors::BridgeError::Streaming("connection reset".to_string())),
        ]);

        let outcome = coordinator.relay(fragments, tx).await;
        assert!(outcome.is_err());
        assert_eq!(coordinator.state(), RelayState::Closed);
    }

    #[tokio::test]
    async fn test_client_disconnect_cancels_relay() {
        let mut coordinator = RelayCoordinator::new(Arc::new(ToolRegistry::default()));
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let fragments = stream::iter(vec![
            text_fragment("never delivered", false),
            text_fragment("nor this", true),
        ]);

        let outcome = coordinator.relay(fragments, tx).await;
        assert!(outcome.is_ok());
        assert_eq!(coordinator.state(), RelayState::Closed);
    }

    #[tokio::test]
    async fn test_tagged_text_fragment_through_pipeline() {
        let mut registry = ToolRegistry::default();
        registry.register_native(
            "Get_current_weather",
            Box::new(|_: &[String]| Ok("weather:ok".to_string())),
        );

        let content = "<|tool_call|>[{\"type\":\"function\",\"function\":{\"name\":\"Get_current_weather\",\"arguments\":{\"location\":\"Paris\",\"format\":\"celsius\"}}}]<|/tool_call|>";
        let (chunks, _) = run_relay(registry, vec![text_fragment(content, true)]).await;

        assert_eq!(chunks, vec![Bytes::from("weather:ok")]);
    }

    #[tokio::test]
    async fn test_bare_call_without_registration_passes_through() {
        let (chunks, _) = run_relay(
            ToolRegistry::default(),
            vec![text_fragment("print(lookup_price(sku123))", true)],
        )
        .await;

        assert_eq!(chunks, vec![Bytes::from("print(lookup_price(sku123))")]);
    }

    #[test]
    fn test_new_coordinator_is_open() {
        let coordinator = RelayCoordinator::new(Arc::new(ToolRegistry::default()));
        assert_eq!(coordinator.state(), RelayState::Open);
    }
}
