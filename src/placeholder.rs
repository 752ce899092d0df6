/// Placeholder illustration
///
/// Rendered locally when AI image generation fails: a 16:9 gradient card with
/// a title, the beginning of the post text and a few decorative glyphs.

use ab_glyph::{FontVec, PxScale};
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_text_mut, text_size};
use std::io::Cursor;
use std::path::Path;

use crate::content::{excerpt, GeneratedImage, GenerationError, ImageRequest};
use crate::fallback::Strategy;

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 675;
const MARGIN: u32 = 50;

const TITLE: &str = "AI Post - Nano Banana Bot";
const TITLE_TOP: i32 = 50;
const TITLE_SCALE: f32 = 48.0;

const BODY_TOP: i32 = 150;
const BODY_SCALE: f32 = 32.0;
const LINE_HEIGHT: i32 = 40;
const MAX_LINES: usize = 15;

const GOLD: Rgb<u8> = Rgb([255, 215, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

pub struct PlaceholderImage {
    font: Option<FontVec>,
}

impl PlaceholderImage {
    /// Load the lettering font; without it the card is rendered unlettered
    pub fn load(font_path: &Path) -> Self {
        let font = match std::fs::read(font_path) {
            Ok(data) => match FontVec::try_from_vec(data) {
                Ok(font) => Some(font),
                Err(e) => {
                    log::warn!("Invalid placeholder font {}: {}", font_path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!(
                    "Placeholder font {} not available ({}), images will have no lettering",
                    font_path.display(),
                    e
                );
                None
            }
        };

        Self { font }
    }

    pub fn without_font() -> Self {
        Self { font: None }
    }

    /// Render the card as PNG bytes
    pub fn render(&self, text: &str) -> Result<Vec<u8>, GenerationError> {
        let mut canvas = gradient_background();

        if let Some(font) = &self.font {
            draw_centered(&mut canvas, font, TITLE, TITLE_SCALE, TITLE_TOP, GOLD);

            let measure = |line: &str| text_size(PxScale::from(BODY_SCALE), font, line).0;
            let lines = limit_lines(wrap_words(text, WIDTH - 2 * MARGIN, measure), MAX_LINES);

            let mut y = BODY_TOP;
            for line in &lines {
                draw_centered(&mut canvas, font, line, BODY_SCALE, y, WHITE);
                y += LINE_HEIGHT;
            }
        }

        draw_glyphs(&mut canvas);

        let mut buffer = Cursor::new(Vec::new());
        canvas
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| GenerationError::Render(e.to_string()))?;

        Ok(buffer.into_inner())
    }
}

#[async_trait]
impl Strategy<ImageRequest, GeneratedImage> for PlaceholderImage {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn attempt(&self, request: &ImageRequest) -> Result<GeneratedImage, GenerationError> {
        log::info!("AI image generation failed, creating fallback image");
        let bytes = self.render(&excerpt(&request.text))?;
        Ok(GeneratedImage::new(bytes, ImageFormat::Png))
    }
}

/// Dark navy at the top fading into blue at the bottom
fn gradient_background() -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |_, y| {
        let shade = (26 + (64 - 26) * y / HEIGHT) as u8;
        let blue = (100 + 55 * y / HEIGHT) as u8;
        Rgb([shade, shade, blue])
    })
}

fn draw_centered(canvas: &mut RgbImage, font: &FontVec, text: &str, scale: f32, y: i32, color: Rgb<u8>) {
    let (width, _) = text_size(PxScale::from(scale), font, text);
    let x = (WIDTH as i32 - width as i32) / 2;
    draw_text_mut(canvas, color, x.max(0), y, PxScale::from(scale), font, text);
}

/// Banana, sparkle and robot stand-ins along the bottom edge
fn draw_glyphs(canvas: &mut RgbImage) {
    let center_x = WIDTH as i32 / 2;
    let y = HEIGHT as i32 - 75;

    for (offset, radius) in [(-60, 18), (0, 10), (60, 18)] {
        draw_filled_circle_mut(canvas, (center_x + offset, y), radius, GOLD);
    }
    for offset in [-30, 30] {
        draw_filled_circle_mut(canvas, (center_x + offset, y - 14), 4, WHITE);
    }
}

/// Greedy word wrap: a line grows while `measure` says it fits in `max_width`.
/// A single word wider than the line gets a line of its own.
pub fn wrap_words(text: &str, max_width: u32, measure: impl Fn(&str) -> u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Keep at most `max` lines; when cutting, the last kept line becomes "..."
pub fn limit_lines(mut lines: Vec<String>, max: usize) -> Vec<String> {
    if lines.len() > max && max > 0 {
        lines.truncate(max - 1);
        lines.push("...".to_string());
    }
    lines
}
