mod bot;
mod config;
mod error;
mod platform;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::{Clock, Dispatcher};
use crate::config::Config;
use crate::platform::telegram::TelegramClient;
use crate::webhook::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tgwebhook=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!(
        "Bot API at {} (timeout {}s), /time zone {} (UTC{:+}min)",
        config.telegram.api_url,
        config.telegram.request_timeout_secs,
        config.clock.zone_name,
        config.clock.utc_offset_minutes
    );
    if config.telegram.bot_token.is_empty() {
        warn!("TELEGRAM_BOT_TOKEN is not set; every Bot API call will fail");
    }

    let telegram = TelegramClient::new(config.api_base(), config.telegram.request_timeout())?;
    let clock = Clock::new(&config.clock).with_context(|| {
        format!(
            "Invalid UTC offset for {}: {} minutes",
            config.clock.zone_name, config.clock.utc_offset_minutes
        )
    })?;

    let state = Arc::new(AppState {
        telegram,
        dispatcher: Dispatcher::new(clock),
    });
    let app = webhook::router(state, &config.server.webhook_path);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;

    info!(
        "Webhook listening on http://{}{}",
        config.server.bind, config.server.webhook_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await
        .context("Server error")?;

    Ok(())
}
