//! HTTP relay between chat clients and an OpenAI-compatible completion API.
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=sk-... moderelay-server
//! OPENAI_API_KEY=sk-... moderelay-server --bind 0.0.0.0:8080 --model gpt-4o-mini
//! ```
//!
//! Logging is controlled by `RUST_LOG` (default: `info,moderelay=debug`).

use std::sync::Arc;

use arrrg::CommandLine;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use moderelay::Relay;
use moderelay::server::{AppState, RelayArgs, RelayConfig, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,moderelay=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    let (args, free) = RelayArgs::from_command_line_relaxed("moderelay-server [OPTIONS]");
    if !free.is_empty() {
        eprintln!("unexpected arguments: {}", free.join(" "));
        std::process::exit(2);
    }
    let config = RelayConfig::try_from(args)?;

    let provider = Arc::new(config.provider(None)?);
    let relay = Relay::new(provider, config.settings.clone());
    let app = router(AppState::new(relay));

    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        model = %config.settings.model,
        upstream = %config.base_url,
        "relay listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
