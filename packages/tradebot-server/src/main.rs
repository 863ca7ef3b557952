//! TradeBot Server - Telegram front end for the TradeBot ledger
//!
//! Receives updates on a webhook (default) or by long polling (`--poll`),
//! runs each chat command against the shared ledger and replies in the chat.

mod handlers;
mod poll;
mod state;
mod telegram;

use anyhow::{anyhow, Context, Result};
use axum::{routing::get, Router};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tradebot_core::{Config, JsonFileStorage};

use state::AppState;
use telegram::TelegramClient;

#[derive(Parser)]
#[command(name = "tradebot-server")]
#[command(about = "TradeBot Telegram server")]
#[command(version)]
struct Args {
    /// Config file (defaults to $TRADEBOT_CONFIG, then the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config
    #[arg(long)]
    bind: Option<String>,

    /// Long-poll getUpdates instead of serving a webhook
    #[arg(long)]
    poll: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load config")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let token = config
        .telegram
        .token
        .clone()
        .ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN environment variable not set"))?;

    let ledger_path = config.ledger_path();
    tracing::info!(path = %ledger_path.display(), "Starting TradeBot");

    let client = TelegramClient::new(&config.telegram.api_url, &token);
    let storage = Arc::new(JsonFileStorage::with_path(ledger_path));
    let state = Arc::new(
        AppState::new(storage, Arc::new(client.clone()))?
            .with_webhook_secret(config.telegram.webhook_secret.clone()),
    );

    if args.poll {
        return poll::run(state, client, config.server.poll_timeout_secs).await;
    }

    let app = Router::new()
        .route("/", get(handlers::health).post(handlers::webhook))
        .route("/health", get(handlers::health))
        .route("/webhook", axum::routing::post(handlers::webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!("Listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
