/// Telegram Bot API module
///
/// Sends photos and text messages to the destination channel with plain
/// multipart/form POSTs, so every failure keeps its HTTP status for retry
/// classification. Teloxide hides that status behind `RequestError::Api`,
/// so it is only used for the bot identity check at startup.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;
use teloxide::prelude::*;
use thiserror::Error;

use crate::content::GeneratedImage;
use crate::retry::{classify_status, classify_transport, with_backoff, Classify, Failure, RetryPolicy};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Telegram API error: {status} - {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
}

impl Classify for PublishError {
    fn classify(&self) -> Failure {
        match self {
            PublishError::Request(e) => classify_transport(e),
            PublishError::Status { status, .. } => classify_status(*status),
            PublishError::InvalidUpload(_) => Failure::Fatal,
        }
    }
}

/// The two sends a channel post is made of.
///
/// A single call is one attempt; retrying is the publisher's job.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    async fn send_photo(&self, image: &GeneratedImage, caption: &str) -> Result<(), PublishError>;

    async fn send_text(&self, text: &str) -> Result<(), PublishError>;
}

pub struct TelegramChannel {
    http_client: reqwest::Client,
    /// `{base}/bot{token}`
    api_url: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(base_url: &str, token: &str, chat_id: &str, timeout: Duration) -> Result<Self, PublishError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_url: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
            chat_id: chat_id.to_string(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<(), PublishError> {
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        Err(PublishError::Status { status, body })
    }
}

#[async_trait]
impl ChannelApi for TelegramChannel {
    async fn send_photo(&self, image: &GeneratedImage, caption: &str) -> Result<(), PublishError> {
        let photo = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)
            .map_err(|e| PublishError::InvalidUpload(e.to_string()))?;

        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .part("photo", photo);

        let response = self
            .http_client
            .post(format!("{}/sendPhoto", self.api_url))
            .multipart(form)
            .send()
            .await?;

        Self::check(response).await
    }

    async fn send_text(&self, text: &str) -> Result<(), PublishError> {
        let response = self
            .http_client
            .post(format!("{}/sendMessage", self.api_url))
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await?;

        Self::check(response).await
    }
}

/// Fetch the bot identity to make sure the token works.
///
/// Returns the bot username.
pub async fn verify_bot(bot: &Bot, retry: &RetryPolicy) -> Result<String, teloxide::RequestError> {
    log::info!("Attempting to connect to Telegram API...");

    let me = with_backoff(retry, || bot.get_me().send()).await?;
    Ok(me.username().to_string())
}

/// Teloxide bot pointed at the configured API base URL
pub fn build_bot(base_url: &str, token: &str, timeout: Duration) -> anyhow::Result<Bot> {
    use anyhow::Context;

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let url = reqwest::Url::parse(base_url).context("Invalid TELEGRAM_API_URL")?;
    Ok(Bot::with_client(token, client).set_api_url(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_errors_are_classified() {
        let status = |code: u16| PublishError::Status {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };

        assert_eq!(status(500).classify(), Failure::Retryable);
        assert_eq!(status(503).classify(), Failure::Retryable);
        assert_eq!(status(400).classify(), Failure::Permanent);
        assert_eq!(status(404).classify(), Failure::Permanent);
        assert_eq!(
            PublishError::InvalidUpload("bad mime".to_string()).classify(),
            Failure::Fatal
        );
    }

    #[test]
    fn api_url_embeds_token() {
        let channel =
            TelegramChannel::new("https://api.telegram.org/", "123:abc", "@chan", Duration::from_secs(30))
                .unwrap();

        assert_eq!(channel.api_url, "https://api.telegram.org/bot123:abc");
    }
}
