//! Shared constants used across the application.

/// User agent string sent with forum page requests.
pub const CRAWLER_USER_AGENT: &str = concat!("forum-digest/", env!("CARGO_PKG_VERSION"));

/// Maximum length of a single Discord message, in characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Delay between fetch retries.
pub const FETCH_RETRY_BACKOFF_MS: u64 = 500;
