/// Post topics and random topic selection

use rand::seq::SliceRandom;
use rand::Rng;

/// Built-in topic list, used unless POST_TOPICS overrides it
pub const DEFAULT_TOPICS: &[&str] = &[
    "ChatGPT vs Gemini: qaysi biri yaxshiroq?",
    "AI promptlarni qanday yozish kerak?",
    "Midjourney bilan professional rasmlar yaratish",
    "AI yordamida biznes g'oyalarini rivojlantirish",
    "Copilot va dasturlash: kelajak bugun",
    "AI detektorlar: qanday ishlaydi?",
    "Stable Diffusion: bepul AI rasm generatori",
    "AI chatbotlar: biznes uchun foydasi",
    "OpenAI API bilan dastur yaratish",
    "AI va ma'lumotlar xavfsizligi",
    "AutoGPT va avtomatik vazifalar",
    "AI bilan kontentni optimallashtirish",
    "Hugging Face: AI modellar markazi",
    "AI yordamida video montaj qilish",
    "Bing AI va Google Bard taqqoslash",
    "AI promptlarda rol-playing texnikasi",
    "Notion AI: produktivlik uchun yordamchi",
    "AI bilan SEO optimizatsiya qilish",
    "Claude AI: Anthropic'ning yutug'i",
    "AI tools for creative writing",
];

pub fn default_topics() -> Vec<String> {
    DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect()
}

/// Parse a `;`-separated topic list, ignoring blank entries
pub fn parse_topics(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Picks one topic per run, uniformly at random
#[derive(Debug, Clone)]
pub struct TopicSelector {
    topics: Vec<String>,
}

impl TopicSelector {
    /// Returns `None` for an empty list, there would be nothing to post about
    pub fn new(topics: Vec<String>) -> Option<Self> {
        if topics.is_empty() {
            None
        } else {
            Some(Self { topics })
        }
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn pick(&self) -> &str {
        self.pick_with(&mut rand::thread_rng())
    }

    pub fn pick_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.topics
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn parses_override_list() {
        assert_eq!(
            parse_topics(" Rust ; ;AI news;"),
            vec!["Rust".to_string(), "AI news".to_string()]
        );
        assert!(parse_topics(" ; ").is_empty());
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(TopicSelector::new(Vec::new()).is_none());
    }

    #[test]
    fn picks_only_known_topics_and_covers_the_list() {
        let selector = TopicSelector::new(default_topics()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let seen: HashSet<&str> = (0..2000).map(|_| selector.pick_with(&mut rng)).collect();

        assert!(seen.iter().all(|t| DEFAULT_TOPICS.contains(t)));
        assert_eq!(seen.len(), DEFAULT_TOPICS.len());
    }
}
