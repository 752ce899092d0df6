/// AI Post Bot
///
/// Posts AI-generated content to a Telegram channel on a fixed daily schedule.
///
/// The bot:
/// - Posts 20 times a day, evenly spread between 07:00 and 21:00 UTC
/// - Writes each post with Gemini about a randomly picked topic
/// - Illustrates it with a Gemini image, or a locally rendered card if that fails
/// - Serves `/` and `/health` for the hosting platform's liveness checks

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use ai_post_bot::bot::{check_bot_credentials, PostingBot};
use ai_post_bot::config::Config;
use ai_post_bot::http_server;
use ai_post_bot::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger, `info` unless RUST_LOG says otherwise
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();

    log::info!("Starting AI Post Bot...");

    // Load configuration from environment
    let config = Config::from_env()?;

    let server = tokio::spawn(http_server::start_server(config.http_port));

    match &config.credentials {
        Some(credentials) => {
            check_bot_credentials(&config, credentials).await;

            match PostingBot::from_config(&config, credentials) {
                Ok(bot) => {
                    let slots = config.schedule_slots()?;
                    let scheduler = Scheduler::new(slots, Arc::new(bot), Utc::now());
                    tokio::spawn(scheduler.run());
                }
                Err(e) => {
                    log::error!("Scheduled posting disabled: {:#}", e);
                }
            }
        }
        None => {
            log::error!(
                "Scheduled posting disabled: set GOOGLE_API_KEY, TELEGRAM_BOT_TOKEN and TELEGRAM_CHANNEL_ID"
            );
        }
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Bot stopped by user");
        }
        result = server => {
            match result {
                Ok(Ok(())) => log::warn!("HTTP server exited"),
                Ok(Err(e)) => {
                    log::error!("HTTP server failed: {:#}", e);
                    return Err(e);
                }
                Err(e) => anyhow::bail!("HTTP server task panicked: {}", e),
            }
        }
    }

    Ok(())
}
