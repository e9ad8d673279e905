//! Report delivery.
//!
//! A [`ChatSink`] takes finished message text and a channel id. Messages are
//! sent exactly once; a failure ends the run.

mod discord;

pub use discord::DiscordClient;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("failed to build chat client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to send message to channel {channel}: {source}")]
    Request {
        channel: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("chat API rejected message to channel {channel}: {status} - {body}")]
    Rejected {
        channel: String,
        status: u16,
        body: String,
    },
}

/// Destination for digest messages.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Post `text` to `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message was not accepted.
    async fn deliver(&self, channel: &str, text: &str) -> Result<(), ChatError>;
}

/// Prints messages instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

#[async_trait]
impl ChatSink for StdoutSink {
    async fn deliver(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        info!(channel, chars = text.chars().count(), "Dry run, printing message");
        println!("{text}");
        Ok(())
    }
}

/// Send `messages` to `channel` in order, stopping at the first failure.
///
/// # Errors
///
/// Returns the first delivery error.
pub async fn deliver_all<C>(sink: &C, channel: &str, messages: &[String]) -> Result<(), ChatError>
where
    C: ChatSink + ?Sized,
{
    for (index, message) in messages.iter().enumerate() {
        sink.deliver(channel, message).await?;
        info!(channel, part = index + 1, of = messages.len(), "Message delivered");
    }
    Ok(())
}
