//! HTTP surface of the gateway
//!
//! Three routes behind the authentication middleware:
//! - `POST {path_base}/ollama/ask`: the streaming chat relay
//! - `GET  {path_base}/ollama/models`: proxied model listing
//! - `GET  {path_base}/ollama/model/{model_name}`: proxied model detail

pub mod handlers;

use crate::auth::{self, AcceptedUsers};
use crate::backend::OllamaClient;
use crate::config::Config;
use crate::tools::ToolRegistry;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Shared application state
///
/// Everything here is read-only after startup; requests share no other
/// state.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<ToolRegistry>,
    pub client: OllamaClient,
    pub users: AcceptedUsers,
}

/// Build the router with all routes and the auth layer.
pub fn router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/ollama/ask", post(handlers::ask))
        .route("/ollama/models", get(handlers::list_models))
        .route("/ollama/model/{model_name}", get(handlers::show_model))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .with_state(state.clone());

    let path_base = state.config.server.path_base.trim_matches('/');
    if path_base.is_empty() {
        routes
    } else {
        Router::new().nest(&format!("/{path_base}"), routes)
    }
}
