/// Posting bot module
///
/// Connects the pieces of one scheduled run: topic selection, content
/// generation and publishing. Also wires up the production clients from the
/// configuration.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, Credentials};
use crate::content::ContentGenerator;
use crate::gemini::GeminiClient;
use crate::placeholder::PlaceholderImage;
use crate::publisher::Publisher;
use crate::scheduler::ScheduledTask;
use crate::telegram::{build_bot, verify_bot, TelegramChannel};
use crate::topics::TopicSelector;

/// Result of one "generate and post" run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    pub topic: String,
    pub with_image: bool,
    pub published: bool,
}

pub struct PostingBot {
    topics: TopicSelector,
    generator: ContentGenerator,
    publisher: Publisher,
}

impl PostingBot {
    pub fn new(topics: TopicSelector, generator: ContentGenerator, publisher: Publisher) -> Self {
        Self {
            topics,
            generator,
            publisher,
        }
    }

    /// Build the production bot: Gemini for content, Telegram for publishing
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self> {
        let topics = TopicSelector::new(config.topics.clone()).context("Topic list is empty")?;

        let gemini = GeminiClient::new(
            &config.gemini_api_url,
            &credentials.google_api_key,
            &config.gemini_text_model,
            &config.gemini_image_model,
            config.request_timeout,
            config.retry,
        )
        .context("Failed to create Gemini client")?;

        let placeholder = PlaceholderImage::load(&config.placeholder_font);
        let generator = ContentGenerator::with_gemini(Arc::new(gemini), placeholder);

        let channel = TelegramChannel::new(
            &config.telegram_api_url,
            &credentials.telegram_bot_token,
            &credentials.telegram_channel_id,
            config.request_timeout,
        )
        .context("Failed to create Telegram client")?;
        let publisher = Publisher::new(Arc::new(channel), config.retry);

        log::info!(
            "AI Post Bot initialized: {} topics, posting to {}",
            topics.topics().len(),
            credentials.telegram_channel_id
        );

        Ok(Self::new(topics, generator, publisher))
    }

    /// Pick a topic, generate the post and publish it
    pub async fn generate_and_post(&self) -> PostOutcome {
        let topic = self.topics.pick().to_string();
        log::info!("Generating post for topic: {}", topic);

        let content = self.generator.generate(&topic).await;
        let with_image = content.image.is_some();
        if !with_image {
            log::warn!("No image available, posting text only");
        }

        let published = self.publisher.publish(&content).await;
        if published {
            log::info!("Post generated and published successfully");
        } else {
            log::error!("Failed to publish post");
        }

        PostOutcome {
            topic,
            with_image,
            published,
        }
    }
}

#[async_trait]
impl ScheduledTask for PostingBot {
    async fn run(&self) -> Result<()> {
        let outcome = self.generate_and_post().await;
        if !outcome.published {
            anyhow::bail!("post about '{}' was not delivered", outcome.topic);
        }
        Ok(())
    }
}

/// Check the bot token against the Telegram API. Failures are only logged:
/// a network hiccup at boot should not disable the whole day of posts.
pub async fn check_bot_credentials(config: &Config, credentials: &Credentials) {
    let bot = match build_bot(
        &config.telegram_api_url,
        &credentials.telegram_bot_token,
        config.request_timeout,
    ) {
        Ok(bot) => bot,
        Err(e) => {
            log::error!("Failed to create Telegram bot: {:#}", e);
            return;
        }
    };

    match verify_bot(&bot, &config.retry).await {
        Ok(username) => log::info!("Bot started: @{}", username),
        Err(e) => log::error!("Failed to connect to Telegram API: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{CannedText, GeneratedImage, GenerationError, ImageRequest};
    use crate::fallback::{FallbackChain, Strategy};
    use crate::retry::RetryPolicy;
    use crate::telegram::{ChannelApi, PublishError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Captions(Mutex<Vec<String>>);

    #[async_trait]
    impl ChannelApi for Captions {
        async fn send_photo(&self, _: &GeneratedImage, caption: &str) -> Result<(), PublishError> {
            self.0.lock().unwrap().push(caption.to_string());
            Ok(())
        }

        async fn send_text(&self, _: &str) -> Result<(), PublishError> {
            Err(PublishError::InvalidUpload("text not expected".to_string()))
        }
    }

    struct TinyImage;

    #[async_trait]
    impl Strategy<ImageRequest, GeneratedImage> for TinyImage {
        fn name(&self) -> &str {
            "tiny"
        }

        async fn attempt(&self, _: &ImageRequest) -> Result<GeneratedImage, GenerationError> {
            Ok(GeneratedImage {
                bytes: vec![0],
                mime_type: "image/png".to_string(),
                file_name: "image.png".to_string(),
            })
        }
    }

    struct Rejecting;

    #[async_trait]
    impl ChannelApi for Rejecting {
        async fn send_photo(&self, _: &GeneratedImage, _: &str) -> Result<(), PublishError> {
            Err(PublishError::InvalidUpload("rejected".to_string()))
        }

        async fn send_text(&self, _: &str) -> Result<(), PublishError> {
            Err(PublishError::InvalidUpload("rejected".to_string()))
        }
    }

    fn bot_with(channel: Arc<dyn ChannelApi>) -> PostingBot {
        PostingBot::new(
            TopicSelector::new(vec!["Rust".to_string()]).unwrap(),
            ContentGenerator::new(
                FallbackChain::new().then(CannedText),
                FallbackChain::new().then(TinyImage),
            ),
            Publisher::new(channel, RetryPolicy::default()),
        )
    }

    #[tokio::test]
    async fn undelivered_post_fails_the_scheduled_run() {
        let bot = bot_with(Arc::new(Rejecting));

        let err = bot.run().await.unwrap_err();
        assert!(err.to_string().contains("Rust"));
    }

    #[tokio::test]
    async fn delivered_post_completes_the_scheduled_run() {
        let bot = bot_with(Arc::new(Captions::default()));
        assert!(bot.run().await.is_ok());
    }

    #[tokio::test]
    async fn run_posts_fallback_text_with_image() {
        let channel = Arc::new(Captions::default());
        let bot = PostingBot::new(
            TopicSelector::new(vec!["Rust".to_string()]).unwrap(),
            ContentGenerator::new(
                FallbackChain::new().then(CannedText),
                FallbackChain::new().then(TinyImage),
            ),
            Publisher::new(channel.clone(), RetryPolicy::default()),
        );

        let outcome = bot.generate_and_post().await;

        assert_eq!(
            outcome,
            PostOutcome {
                topic: "Rust".to_string(),
                with_image: true,
                published: true,
            }
        );
        let captions = channel.0.lock().unwrap();
        assert_eq!(captions.len(), 1);
        assert!(captions[0].contains("Rust"));
    }
}
