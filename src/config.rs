use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Forum
    pub forum_root_url: Url,
    pub forum_utc_offset: FixedOffset,

    // Checkpoint
    pub checkpoint_log_path: PathBuf,
    pub checkpoint_fallback_days: u32,

    // Fetching
    pub fetch_timeout: Duration,
    pub fetch_retries: u32,

    // Chat delivery
    pub discord_bot_token: Option<String>,
    pub discord_channel_id: Option<String>,
    pub discord_api_base: String,
    pub chat_preformatted: bool,
    pub post_when_empty: bool,
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Forum
            forum_root_url: parse_url("FORUM_ROOT_URL", &required_env("FORUM_ROOT_URL")?)?,
            forum_utc_offset: parse_utc_offset(&env_or_default("FORUM_UTC_OFFSET", "+00:00"))?,

            // Checkpoint
            checkpoint_log_path: PathBuf::from(env_or_default(
                "CHECKPOINT_LOG_PATH",
                "forum-digest.log",
            )),
            checkpoint_fallback_days: parse_env_u32("CHECKPOINT_FALLBACK_DAYS", 1)?,

            // Fetching
            fetch_timeout: Duration::from_secs(parse_env_u64("FETCH_TIMEOUT_SECS", 30)?),
            fetch_retries: parse_env_u32("FETCH_RETRIES", 0)?,

            // Chat delivery
            discord_bot_token: optional_env("DISCORD_BOT_TOKEN"),
            discord_channel_id: optional_env("DISCORD_CHANNEL_ID"),
            discord_api_base: env_or_default("DISCORD_API_BASE", "https://discord.com/api/v10"),
            chat_preformatted: parse_env_bool("CHAT_PREFORMATTED", true)?,
            post_when_empty: parse_env_bool("POST_WHEN_EMPTY", false)?,
            dry_run: parse_env_bool("DRY_RUN", false)?,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.forum_root_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                name: "FORUM_ROOT_URL".to_string(),
                message: "must be an http or https URL".to_string(),
            });
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "FETCH_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !self.dry_run {
            if self.discord_bot_token.is_none() {
                return Err(ConfigError::MissingEnvVar("DISCORD_BOT_TOKEN".to_string()));
            }
            if self.discord_channel_id.is_none() {
                return Err(ConfigError::MissingEnvVar("DISCORD_CHANNEL_ID".to_string()));
            }
        }
        Ok(())
    }

    /// Configuration suitable for tests: dry run, no retries, short timeout.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            forum_root_url: Url::parse("http://forum.example.com/forum.php")
                .expect("static URL is valid"),
            forum_utc_offset: FixedOffset::east_opt(0).expect("zero offset is valid"),
            checkpoint_log_path: PathBuf::from("forum-digest.log"),
            checkpoint_fallback_days: 1,
            fetch_timeout: Duration::from_secs(5),
            fetch_retries: 0,
            discord_bot_token: None,
            discord_channel_id: None,
            discord_api_base: "https://discord.com/api/v10".to_string(),
            chat_preformatted: true,
            post_when_empty: false,
            dry_run: true,
        }
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// Parse a UTC offset such as `+02:00`, `-0530`, `+1`, `Z` or `UTC`.
fn parse_utc_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        name: "FORUM_UTC_OFFSET".to_string(),
        message: format!("expected an offset like '+02:00', got '{value}'"),
    };

    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
