//! ollamabridge - Server entry point

use anyhow::{Context, Result};
use clap::Parser;
use ollamabridge::auth::{generate_secure_password, AcceptedUsers};
use ollamabridge::backend::OllamaClient;
use ollamabridge::cli::Args;
use ollamabridge::config::Config;
use ollamabridge::server::{self, AppState};
use ollamabridge::tools::ToolRegistry;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    let mut config = Config::load(args.config.as_deref())?;
    config.apply_env()?;

    // CLI flags win over both the file and the environment
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = &args.ollama_host {
        config.backend.host = host.clone();
    }
    if let Some(dir) = &args.tools_dir {
        config.tools.script_dir = dir.clone();
    }

    if config.auth.accepted_users.is_empty() {
        let secret = generate_secure_password(64)?;
        tracing::info!(
            "No accepted users configured. Generated default credentials: user 'admin', jwt secret '{secret}'"
        );
        tracing::info!(
            "To set your own, configure [auth] accepted_users or set ACCEPTED_USERS to a JSON object \
             of user to secret. Log in with the username and a JWT signed with the secret whose \
             'sub' claim is the username."
        );
        config
            .auth
            .accepted_users
            .insert("admin".to_string(), secret);
    }

    let registry = Arc::new(ToolRegistry::new(config.tools.script_dir.clone()));
    tracing::info!(
        script_dir = %config.tools.script_dir.display(),
        native_tools = ?registry.native_names(),
        "tool registry initialized"
    );

    let client = OllamaClient::with_host(&config.backend.host)?;
    if client.health_check().await {
        tracing::info!(host = %client.host(), "Ollama backend reachable");
    } else {
        tracing::warn!(
            host = %client.host(),
            "Ollama backend not reachable yet; chat requests will fail until it is"
        );
    }

    let port = config.server.port;
    let users = AcceptedUsers::new(config.auth.accepted_users.clone());
    let state = Arc::new(AppState {
        config,
        registry,
        client,
        users,
    });

    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    tracing::info!("Listening on port {port}");

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ollamabridge={default_level},info")));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
