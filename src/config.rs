/// Configuration module for managing environment variables and API keys
///
/// This module loads all configuration values from environment variables
/// (typically from a .env file). Credentials are kept separate: when they are
/// missing the bot still starts, but only serves the liveness endpoints.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryPolicy;
use crate::scheduler::{compute_slots, ScheduleSlot};
use crate::topics::{default_topics, parse_topics};

const DEFAULT_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Parse an optional variable; malformed values count as unset
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),
}

/// Secrets required for posting
#[derive(Clone)]
pub struct Credentials {
    /// Google AI Studio key for Gemini
    pub google_api_key: String,

    /// Telegram bot token from BotFather
    pub telegram_bot_token: String,

    /// Destination channel, either `@channelname` or a numeric chat id
    pub telegram_channel_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("google_api_key", &"<redacted>")
            .field("telegram_bot_token", &"<redacted>")
            .field("telegram_channel_id", &self.telegram_channel_id)
            .finish()
    }
}

impl Credentials {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &'static str, missing: &mut Vec<&'static str>| {
            let value = lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();
            if value.is_empty() {
                missing.push(key);
            }
            value
        };

        let mut missing = Vec::new();
        let google_api_key = read("GOOGLE_API_KEY", &mut missing);
        let telegram_bot_token = read("TELEGRAM_BOT_TOKEN", &mut missing);
        let telegram_channel_id = read("TELEGRAM_CHANNEL_ID", &mut missing);

        if !missing.is_empty() {
            return Err(ConfigError::MissingCredentials(missing));
        }

        Ok(Self {
            google_api_key,
            telegram_bot_token,
            telegram_channel_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` disables scheduled posting
    pub credentials: Option<Credentials>,

    /// Gemini API base URL (overridable for tests and proxies)
    pub gemini_api_url: String,

    /// Gemini model used for post text (e.g., "gemini-1.5-flash-latest")
    pub gemini_text_model: String,

    /// Gemini model used for illustrations
    pub gemini_image_model: String,

    /// Telegram Bot API base URL
    pub telegram_api_url: String,

    /// First posting hour of the day (UTC)
    pub schedule_start_hour: u32,

    /// Last posting hour of the day (UTC)
    pub schedule_end_hour: u32,

    pub posts_per_day: usize,

    pub topics: Vec<String>,

    /// TTF font used to letter the placeholder image
    pub placeholder_font: PathBuf,

    /// Port for the liveness HTTP server
    pub http_port: u16,

    /// Timeout of a single outbound HTTP attempt
    pub request_timeout: Duration,

    pub retry: RetryPolicy,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if the posting schedule or topic list is invalid.
    /// Missing credentials are not an error here, see [`Config::credentials`].
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let string_or = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let credentials = match Credentials::from_lookup(&lookup) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        };

        let retry = RetryPolicy {
            max_attempts: parse_var(&lookup, "RETRY_MAX_ATTEMPTS").unwrap_or(3),
            ..RetryPolicy::default()
        };

        let config = Config {
            credentials,

            gemini_api_url: string_or("GEMINI_API_URL", "https://generativelanguage.googleapis.com"),
            gemini_text_model: string_or("GEMINI_TEXT_MODEL", "gemini-1.5-flash-latest"),
            gemini_image_model: string_or("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image-preview"),
            telegram_api_url: string_or("TELEGRAM_API_URL", "https://api.telegram.org"),

            schedule_start_hour: parse_var(&lookup, "SCHEDULE_START_HOUR").unwrap_or(7),
            schedule_end_hour: parse_var(&lookup, "SCHEDULE_END_HOUR").unwrap_or(21),
            posts_per_day: parse_var(&lookup, "POSTS_PER_DAY").unwrap_or(20),

            topics: lookup("POST_TOPICS")
                .map(|raw| parse_topics(&raw))
                .filter(|topics| !topics.is_empty())
                .unwrap_or_else(default_topics),

            placeholder_font: PathBuf::from(string_or("PLACEHOLDER_FONT", DEFAULT_FONT)),

            // HTTP_PORT wins, then PORT (Render/Railway/Fly.io), then 8080
            http_port: parse_var(&lookup, "HTTP_PORT")
                .or_else(|| parse_var(&lookup, "PORT"))
                .unwrap_or(8080),

            request_timeout: Duration::from_secs(parse_var(&lookup, "REQUEST_TIMEOUT_SECS").unwrap_or(30)),
            retry,
        };

        config.validate()?;
        Ok(config)
    }

    /// Posting slots derived from the schedule window
    pub fn schedule_slots(&self) -> Result<Vec<ScheduleSlot>> {
        compute_slots(
            self.schedule_start_hour,
            self.schedule_end_hour,
            self.posts_per_day,
        )
        .context("Invalid posting schedule")
    }

    /// Check that the non-secret settings make sense
    pub fn validate(&self) -> Result<()> {
        self.schedule_slots()?;

        if self.topics.is_empty() {
            anyhow::bail!("Topic list must not be empty");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("RETRY_MAX_ATTEMPTS must be at least 1");
        }

        Ok(())
    }
}
