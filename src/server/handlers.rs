//! Route handlers
//!
//! The chat handler owns the wiring between the backend fragment stream
//! and the per-request coordinator: fragments flow through the relay into
//! an mpsc channel whose receiver backs the response body, so every
//! coordinator write reaches the wire as its own flushed chunk. Dropping
//! the response (client disconnect) tears the channel down, which the
//! coordinator observes on its next write and propagates upstream as
//! cancellation.

use crate::backend::types::ChatRequest;
use crate::relay::RelayCoordinator;
use crate::server::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// `POST /ollama/ask`: relay one streaming chat request
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let fragments = match state.client.chat_stream(request).await {
        Ok(fragments) => fragments,
        Err(err) => {
            tracing::error!(error = %err, "failed to open backend chat stream");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process chat request",
            )
                .into_response();
        }
    };

    let (tx, rx) = mpsc::channel::<Bytes>(32);
    let registry = state.registry.clone();

    tokio::spawn(async move {
        let mut coordinator = RelayCoordinator::new(registry);
        if let Err(err) = coordinator.relay(fragments, tx).await {
            tracing::warn!(
                request_id = %coordinator.request_id(),
                error = %err,
                "relay terminated on backend error"
            );
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// `GET /ollama/models`: proxy the backend's model listing
pub async fn list_models(State(state): State<Arc<AppState>>) -> Response {
    match state.client.list_models_raw().await {
        Ok(models) => (
            [(header::CONTENT_TYPE, "application/json")],
            models,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to list backend models");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to call Ollama API").into_response()
        }
    }
}

/// `GET /ollama/model/{model_name}`: proxy the backend's model detail
pub async fn show_model(
    State(state): State<Arc<AppState>>,
    Path(model_name): Path<String>,
) -> Response {
    match state.client.show_model_raw(&model_name).await {
        Ok(info) => ([(header::CONTENT_TYPE, "application/json")], info).into_response(),
        Err(err) => {
            tracing::error!(model = %model_name, error = %err, "failed to fetch model information");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch model information",
            )
                .into_response()
        }
    }
}
