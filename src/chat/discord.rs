use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatError, ChatSink};
use crate::config::Config;
use crate::constants::CRAWLER_USER_AGENT;

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
}

/// Posts messages through the Discord REST API as a bot user.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl DiscordClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(CRAWLER_USER_AGENT)
            .build()
            .map_err(ChatError::Client)?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Build a client from the bot token and API base in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config, token: &str) -> Result<Self, ChatError> {
        Self::new(&config.discord_api_base, token, config.fetch_timeout)
    }
}

#[async_trait]
impl ChatSink for DiscordClient {
    async fn deliver(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        let url = format!("{}/channels/{channel}/messages", self.api_base);
        debug!(channel, chars = text.chars().count(), "Posting message to Discord");

        let request_error = |source| ChatError::Request {
            channel: channel.to_string(),
            source,
        };

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .json(&CreateMessage { content: text })
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(ChatError::Rejected {
                channel: channel.to_string(),
                status,
                body,
            });
        }

        let message: MessageResponse = response.json().await.map_err(request_error)?;
        debug!(channel, message_id = %message.id, "Discord accepted message");
        Ok(())
    }
}
