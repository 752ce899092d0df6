/// AI Post Bot Library
///
/// Core functionality of the scheduled posting bot: configuration, the daily
/// scheduler, the retry wrapper, content generation with fallbacks, and
/// publishing to Telegram.

pub mod bot;
pub mod config;
pub mod content;
pub mod fallback;
pub mod gemini;
pub mod http_server;
pub mod placeholder;
pub mod publisher;
pub mod retry;
pub mod scheduler;
pub mod telegram;
pub mod topics;
