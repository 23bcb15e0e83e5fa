//! Ollama API streaming client
//!
//! Thin proxy client for the backend the gateway mediates:
//! - `POST /api/chat` as a decoded fragment stream
//! - `GET /api/tags` and `POST /api/show` proxied raw for the UI
//! - liveness check against `/api/version`
//!
//! Dropping the fragment stream cancels the underlying request, which is
//! how the coordinator propagates client disconnects upstream.

use crate::backend::parser::FragmentParser;
use crate::backend::types::{ChatFragment, ChatRequest};
use crate::errors::{BridgeError, Result};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Connection timeout; no overall request timeout is applied because a
/// chat response may legitimately stream for minutes
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Ollama streaming client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    host: String,
}

impl OllamaClient {
    /// Create a client against the default local endpoint
    pub fn new() -> Result<Self> {
        Self::with_host(DEFAULT_OLLAMA_HOST)
    }

    /// Create a client against a custom endpoint
    pub fn with_host(host: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(BridgeError::Http)?;

        let mut host = host.into();
        while host.ends_with('/') {
            host.pop();
        }

        Ok(Self { client, host })
    }

    /// Open a streaming chat request and decode the reply into fragments.
    ///
    /// `stream` is forced on: the gateway's whole point is per-fragment
    /// delivery.
    pub async fn chat_stream(
        &self,
        mut request: ChatRequest,
    ) -> Result<BoxStream<'static, Result<ChatFragment>>> {
        request.stream = true;
        let url = format!("{}/api/chat", self.host);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BridgeError::OllamaApi(format!("failed to send chat request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BridgeError::OllamaApi(format!(
                "HTTP {status}: {error_text}"
            )));
        }

        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| BridgeError::Streaming(e.to_string())))
            .scan(FragmentParser::new(), |parser, item| {
                let decoded: Vec<Result<ChatFragment>> = match item {
                    Ok(bytes) => match parser.push(&bytes) {
                        Ok(fragments) => fragments.into_iter().map(Ok).collect(),
                        Err(err) => vec![Err(err)],
                    },
                    Err(err) => vec![Err(err)],
                };
                futures_util::future::ready(Some(futures_util::stream::iter(decoded)))
            })
            .flatten();

        Ok(stream.boxed())
    }

    /// Proxy the backend's model listing (`/api/tags`) raw
    pub async fn list_models_raw(&self) -> Result<Bytes> {
        let url = format!("{}/api/tags", self.host);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::OllamaApi(format!("failed to list models: {e}")))?;

        if !response.status().is_success() {
            return Err(BridgeError::OllamaApi(
                "failed to retrieve model list".to_string(),
            ));
        }

        response
            .bytes()
            .await
            .map_err(|e| BridgeError::OllamaApi(format!("failed to read model list: {e}")))
    }

    /// Proxy the backend's model detail endpoint (`/api/show`) raw
    pub async fn show_model_raw(&self, model_name: &str) -> Result<Bytes> {
        let url = format!("{}/api/show", self.host);
        let payload = serde_json::json!({ "model": model_name });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BridgeError::OllamaApi(format!("failed to fetch model info: {e}")))?;

        if !response.status().is_success() {
            return Err(BridgeError::OllamaApi(format!(
                "failed to fetch model information for '{model_name}'"
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| BridgeError::OllamaApi(format!("failed to read model info: {e}")))
    }

    /// Check if the backend is reachable
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.host);

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Backend base URL
    pub fn host(&self) -> &str {
        &self.host
    }
}
