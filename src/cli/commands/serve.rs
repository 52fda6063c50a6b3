//! HTTP server command.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::server::{self, AppState};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Run the chat and upload server until interrupted.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let state = Arc::new(AppState::from_settings(&settings)?);
    let static_dir = settings.static_dir();
    let app = server::app(state, static_dir.as_deref(), settings.server.body_limit_bytes);

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Docent Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Chat", "POST /chat");
    Output::kv("Upload", "POST /upload");
    Output::kv("Health", "GET  /health");
    if let Some(dir) = &static_dir {
        Output::kv("Static files", &dir.display().to_string());
    }
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    info!(
        "Serving with answer model {} and utility model {}",
        settings.models.answer_model, settings.models.utility_model
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
