/// Content generation module
///
/// Produces the text and illustration of one post. Both go through a
/// fallback chain: Gemini first, then a local substitute, so a post always
/// has non-empty text and usually an image.

use async_trait::async_trait;
use image::ImageFormat;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

use crate::fallback::{FallbackChain, Strategy};
use crate::gemini::GeminiClient;
use crate::placeholder::PlaceholderImage;
use crate::retry::{classify_status, classify_transport, Classify, Failure};

/// Generated text shorter than this is kept but logged as suspicious
const MIN_EXPECTED_TEXT_CHARS: usize = 50;

/// How much of the post text goes onto the placeholder image
const PLACEHOLDER_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to parse API response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
    #[error("response text is empty")]
    Empty,
    #[error("no inline image data in response")]
    NoImage,
    #[error("invalid image data: {0}")]
    Image(#[from] image::ImageError),
    #[error("placeholder rendering failed: {0}")]
    Render(String),
}

impl Classify for GenerationError {
    fn classify(&self) -> Failure {
        match self {
            GenerationError::Request(e) => classify_transport(e),
            GenerationError::Status { status, .. } => classify_status(*status),
            _ => Failure::Fatal,
        }
    }
}

/// An encoded image ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl GeneratedImage {
    pub fn new(bytes: Vec<u8>, format: ImageFormat) -> Self {
        let extension = format.extensions_str().first().copied().unwrap_or("img");
        Self {
            bytes,
            mime_type: format.to_mime_type().to_string(),
            file_name: format!("image.{}", extension),
        }
    }

    /// Accept `bytes` only if they decode as an image
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self, GenerationError> {
        if bytes.is_empty() {
            return Err(GenerationError::NoImage);
        }

        let format = image::guess_format(&bytes)?;
        image::load_from_memory_with_format(&bytes, format)?;

        Ok(Self::new(bytes, format))
    }
}

/// Everything needed to publish one post
#[derive(Debug, Clone)]
pub struct GeneratedContent {
    pub text: String,
    pub image: Option<GeneratedImage>,
}

/// Input of the image chain
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub topic: String,
    /// Post text, used to letter the placeholder
    pub text: String,
}

pub fn text_prompt(topic: &str) -> String {
    format!(
        "Mavzu: {topic}\n\n\
        O'zbek tilida AI va texnologiya haqida 200-300 so'zlik ma'lumotli va qiziqarli post yozing. \
        Post quyidagi talablarga javob berishi kerak:\n\
        - Oddiy va tushunarli til\n\
        - Praktik maslahatlar berish\n\
        - Misollar keltirish\n\
        - Savol bilan tugashi (engagement uchun)\n\
        - Professional va do'stona ohang\n\n\
        Postda hashtag ishlatmang, faqat sof matn bo'lsin."
    )
}

pub fn image_prompt(topic: &str) -> String {
    format!(
        "Create a high-quality, educational infographic-style image about: '{topic}'. \
        Visualize the concept using creative metaphors. Include a small, glowing nano-banana \
        (1cm size, made of golden circuit boards and neon-blue wires, smiling, floating in zero gravity) \
        as the central symbol of AI intelligence. Surround it with icons: brain, robot, code brackets, \
        speech bubble with 'Prompt', lightbulb, gears. Background: soft gradient purple-cyan cosmic space. \
        Style: futuristic educational infographic, clean vector art, professional design, \
        no text overlay, 16:9 aspect ratio, ultra-detailed, photorealistic lighting."
    )
}

/// Canned paragraph used when text generation fails
pub fn fallback_text(topic: &str) -> String {
    format!(
        "AI texnologiyalari kundan-kunga rivojlanmoqda va bizning hayotimizni o'zgartirmoqda. \
        {topic} mavzusi bo'yicha ko'proq o'rganish juda muhim.\n\n\
        Bugungi kunda AI asboblari bizga vaqt tejash, samaradorlikni oshirish va yangi imkoniyatlar \
        ochishda yordam bermoqda. Har bir yangi AI texnologiyasi o'z afzalliklari va cheklovlariga ega.\n\n\
        Bu sohadagi yangiliklar va rivojlanishlar doimo kuzatib borish zarur. \
        Professional rivojlanish uchun doimiy o'rganish va amaliyot qilish muhim.\n\n\
        Sizning fikringizcha, AI texnologiyalari kelajakda qanday rivojlanadi?"
    )
}

/// First `PLACEHOLDER_EXCERPT_CHARS` characters of the post, followed by "..."
pub fn excerpt(text: &str) -> String {
    let mut excerpt: String = text.chars().take(PLACEHOLDER_EXCERPT_CHARS).collect();
    excerpt.push_str("...");
    excerpt
}

pub struct GeminiText(pub Arc<GeminiClient>);

#[async_trait]
impl Strategy<str, String> for GeminiText {
    fn name(&self) -> &str {
        "gemini-text"
    }

    async fn attempt(&self, topic: &str) -> Result<String, GenerationError> {
        log::info!("Generating text for topic: {}", topic);
        let text = self.0.generate_text(&text_prompt(topic)).await?;

        let chars = text.chars().count();
        if chars < MIN_EXPECTED_TEXT_CHARS {
            log::warn!("Generated text seems too short ({} chars): {}", chars, text);
        }
        log::info!("Successfully generated {} characters of text", chars);

        Ok(text)
    }
}

pub struct CannedText;

#[async_trait]
impl Strategy<str, String> for CannedText {
    fn name(&self) -> &str {
        "canned-text"
    }

    async fn attempt(&self, topic: &str) -> Result<String, GenerationError> {
        Ok(fallback_text(topic))
    }
}

pub struct GeminiImage(pub Arc<GeminiClient>);

#[async_trait]
impl Strategy<ImageRequest, GeneratedImage> for GeminiImage {
    fn name(&self) -> &str {
        "gemini-image"
    }

    async fn attempt(&self, request: &ImageRequest) -> Result<GeneratedImage, GenerationError> {
        let payloads = self.0.generate_image(&image_prompt(&request.topic)).await?;

        let mut last_error = GenerationError::NoImage;
        for payload in payloads {
            match GeneratedImage::from_encoded(payload.bytes) {
                Ok(image) => return Ok(image),
                Err(e) => {
                    log::warn!(
                        "Inline payload ({}) is not a usable image: {}",
                        payload.mime_type.as_deref().unwrap_or("unknown type"),
                        e
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Produces the text and image of a post
pub struct ContentGenerator {
    text_chain: FallbackChain<str, String>,
    image_chain: FallbackChain<ImageRequest, GeneratedImage>,
}

impl ContentGenerator {
    pub fn new(
        text_chain: FallbackChain<str, String>,
        image_chain: FallbackChain<ImageRequest, GeneratedImage>,
    ) -> Self {
        Self {
            text_chain,
            image_chain,
        }
    }

    /// Gemini first, local substitutes second
    pub fn with_gemini(client: Arc<GeminiClient>, placeholder: PlaceholderImage) -> Self {
        Self::new(
            FallbackChain::new()
                .then(GeminiText(client.clone()))
                .then(CannedText),
            FallbackChain::new()
                .then(GeminiImage(client))
                .then(placeholder),
        )
    }

    /// Always non-empty
    pub async fn generate_text(&self, topic: &str) -> String {
        match self.text_chain.run(topic).await {
            Some((text, source)) if !text.trim().is_empty() => {
                log::info!("Post text provided by {}", source);
                text
            }
            _ => fallback_text(topic),
        }
    }

    /// `None` only when every image strategy failed
    pub async fn generate_image(&self, topic: &str, text: &str) -> Option<GeneratedImage> {
        let request = ImageRequest {
            topic: topic.to_string(),
            text: text.to_string(),
        };

        let (image, source) = self.image_chain.run(&request).await?;
        log::info!(
            "Image provided by {} ({}, {} bytes)",
            source,
            image.mime_type,
            image.bytes.len()
        );
        Some(image)
    }

    pub async fn generate(&self, topic: &str) -> GeneratedContent {
        let text = self.generate_text(topic).await;
        let image = self.generate_image(topic, &text).await;

        GeneratedContent { text, image }
    }
}
