//! Main Entrypoint for the Voice Agent API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the agent persona from the prompts directory.
//! 3. Building clients for every configured upstream service.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use std::{collections::HashMap, fs, net::SocketAddr, path::Path, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use voice_agent_api::{
    config::Config,
    router::create_router,
    state::{AppState, build_collaborators},
};
use voice_agent_core::llm_client::DEFAULT_PERSONA;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in fs::read_dir(prompts_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    for var in config.missing_credentials() {
        warn!(
            "{} is not set; endpoints that depend on it will report a configuration issue.",
            var
        );
    }

    // --- 3. Load the Persona ---
    let persona = match load_prompts(&config.prompts_path) {
        Ok(prompts) => prompts.get("persona").map(|p| p.trim().to_string()),
        Err(e) => {
            warn!(
                path = %config.prompts_path.display(),
                error = %e,
                "Could not read prompts directory"
            );
            None
        }
    }
    .filter(|p| !p.is_empty())
    .unwrap_or_else(|| {
        info!("No persona.md found, using the built-in persona.");
        DEFAULT_PERSONA.to_string()
    });

    // --- 4. Initialize Shared Services ---
    let collaborators = build_collaborators(&config, Some(persona))
        .context("Failed to build upstream service clients")?;
    let app_state = Arc::new(AppState::new(config.clone(), collaborators));

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        voice = %config.voice_id,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
