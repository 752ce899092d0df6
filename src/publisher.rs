/// Publisher Module
///
/// Turns generated content into channel messages: photo with caption when it
/// fits, photo with a shortened caption plus the full text when it doesn't,
/// plain text when there is no image.

use std::sync::Arc;

use crate::content::{GeneratedContent, GeneratedImage};
use crate::retry::{with_backoff, RetryPolicy};
use crate::telegram::{ChannelApi, PublishError};

/// Telegram limit for a photo caption
pub const CAPTION_LIMIT: usize = 1024;

/// Telegram limit for a single text message
pub const MESSAGE_LIMIT: usize = 4096;

/// Appended to a shortened caption, the full text follows in its own message
pub const CONTINUATION_MARKER: &str = "... (davomi keyingi xabarda)";

pub struct Publisher {
    channel: Arc<dyn ChannelApi>,
    retry: RetryPolicy,
}

impl Publisher {
    pub fn new(channel: Arc<dyn ChannelApi>, retry: RetryPolicy) -> Self {
        Self { channel, retry }
    }

    /// Deliver the post. Never fails: errors are logged and reported as `false`.
    pub async fn publish(&self, content: &GeneratedContent) -> bool {
        match self.try_publish(content).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Error posting to Telegram: {}", e);
                false
            }
        }
    }

    async fn try_publish(&self, content: &GeneratedContent) -> Result<(), PublishError> {
        let text = content.text.as_str();

        let Some(image) = &content.image else {
            self.send_text(text).await?;
            log::info!("Posted to Telegram (text only)");
            return Ok(());
        };

        let length = text.chars().count();
        if length <= CAPTION_LIMIT {
            self.send_photo(image, text).await?;
            log::info!("Posted to Telegram with image and full caption");
            return Ok(());
        }

        log::info!(
            "Caption too long ({} chars), truncating and sending full text separately",
            length
        );
        self.send_photo(image, &truncate_caption(text)).await?;
        self.send_text(text).await?;
        log::info!("Posted to Telegram with image and full text in separate message");
        Ok(())
    }

    async fn send_photo(&self, image: &GeneratedImage, caption: &str) -> Result<(), PublishError> {
        with_backoff(&self.retry, || self.channel.send_photo(image, caption)).await
    }

    /// Send `text`, split into several messages if it exceeds the message limit
    async fn send_text(&self, text: &str) -> Result<(), PublishError> {
        let chunks = split_message(text, MESSAGE_LIMIT);
        if chunks.len() > 1 {
            log::info!("Text too long, sending as {} messages", chunks.len());
        }

        for chunk in &chunks {
            with_backoff(&self.retry, || self.channel.send_text(chunk)).await?;
        }
        Ok(())
    }
}

/// Shorten `text` so that it plus the continuation marker fits in a caption
pub fn truncate_caption(text: &str) -> String {
    if text.chars().count() <= CAPTION_LIMIT {
        return text.to_string();
    }

    let keep = CAPTION_LIMIT - CONTINUATION_MARKER.chars().count();
    let mut caption: String = text.chars().take(keep).collect();
    caption.push_str(CONTINUATION_MARKER);
    caption
}

/// Split `text` into chunks of at most `limit` characters, preferring to cut
/// at whitespace. Chunks are trimmed at the cut; text under the limit is
/// returned as is.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        // Byte offset just past the `limit`-th character
        let hard_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        let cut = rest[..hard_end]
            .rfind(char::is_whitespace)
            .filter(|&i| i > 0)
            .unwrap_or(hard_end);

        let chunk = rest[..cut].trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}
