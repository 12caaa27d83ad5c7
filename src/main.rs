// This is the entry point of the moderation settings bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic): the config editor and its sessions
// - `infra/` = Implementations of core traits (console API, JSON store)
// - `discord/` = Discord-specific adapters (slash commands, embeds)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and background tasks

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::moderation::ModerationSettingsService;
use crate::discord::{Data, Error};
use crate::infra::moderation::{ConsoleApiClient, JsonModerationStore};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_SESSION_IDLE_SECS: u64 = 15 * 60;

/// Settings read from the environment (and `.env`).
struct BotConfig {
    token: String,
    console_api_url: String,
    console_api_token: Option<String>,
    data_dir: String,
    session_idle: Duration,
}

impl BotConfig {
    fn from_env() -> anyhow::Result<Self> {
        let token = std::env::var("DISCORD_TOKEN").context(
            "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
        )?;
        let console_api_url = std::env::var("CONSOLE_API_URL")
            .context("Missing CONSOLE_API_URL environment variable!")?;
        let console_api_token = std::env::var("CONSOLE_API_TOKEN").ok();
        let data_dir =
            std::env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
        let session_idle = parse_idle_secs(std::env::var("MODERATION_SESSION_IDLE_SECS").ok());

        Ok(Self {
            token,
            console_api_url,
            console_api_token,
            data_dir,
            session_idle,
        })
    }
}

fn parse_idle_secs(raw: Option<String>) -> Duration {
    let secs = raw
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_SESSION_IDLE_SECS);
    Duration::from_secs(secs)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;

    // Keep runtime files in a dedicated folder so the repo root stays tidy.
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {}", config.data_dir))?;
    let settings_path = format!("{}/moderation_settings.json", config.data_dir);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let console = ConsoleApiClient::new(&config.console_api_url, config.console_api_token.clone())
        .context("Failed to create console API client")?;
    let store = JsonModerationStore::load(&settings_path)
        .with_context(|| format!("Failed to load {}", settings_path))?;
    let moderation_service = Arc::new(ModerationSettingsService::new(console, store));

    let data = Data {
        moderation: Arc::clone(&moderation_service),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    // Slash commands only - no message content needed.
    let intents = serenity::GatewayIntents::GUILDS;
    let session_idle = config.session_idle;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![discord::moderation::commands::moderation()],
            on_error: |error| {
                Box::pin(async move {
                    if let poise::FrameworkError::Command { error, ctx, .. } = &error {
                        tracing::error!(
                            command = %ctx.command().qualified_name,
                            "Command failed: {}",
                            error
                        );
                    }
                    if let Err(e) = poise::builtins::on_error(error).await {
                        tracing::error!("Error while handling error: {}", e);
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up...");

                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                // Background sweep of abandoned editing sessions.
                let sweeper = Arc::clone(&data.moderation);
                tokio::spawn(async move {
                    use tokio::time::sleep;

                    loop {
                        sleep(Duration::from_secs(60)).await;
                        let dropped = sweeper.sweep_idle(session_idle);
                        tracing::debug!(dropped, "Idle session sweep finished");
                    }
                });

                Ok::<Data, Error>(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_idle_secs() {
        assert_eq!(parse_idle_secs(None), Duration::from_secs(DEFAULT_SESSION_IDLE_SECS));
        assert_eq!(parse_idle_secs(Some("120".to_string())), Duration::from_secs(120));
        assert_eq!(
            parse_idle_secs(Some("0".to_string())),
            Duration::from_secs(DEFAULT_SESSION_IDLE_SECS)
        );
        assert_eq!(
            parse_idle_secs(Some("soon".to_string())),
            Duration::from_secs(DEFAULT_SESSION_IDLE_SECS)
        );
    }
}
