//! One digest run: crawl, summarize, decide what to send.

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::constants::DISCORD_MESSAGE_LIMIT;
use crate::crawler::{CrawlContext, CrawlError, Crawler};
use crate::dates::DateNormalizer;
use crate::fetch::PageSource;
use crate::forum::PostSet;
use crate::summary::{summarize, Report, TitleGroup};

/// The outcome of crawling the forum since a checkpoint.
#[derive(Debug, Clone)]
pub struct Digest {
    pub checkpoint: DateTime<Utc>,
    pub posts: PostSet,
    pub groups: Vec<TitleGroup>,
    pub report: Report,
}

impl Digest {
    /// Whether there is anything worth telling the channel.
    #[must_use]
    pub fn should_deliver(&self, config: &Config) -> bool {
        !self.posts.is_empty() || config.post_when_empty
    }

    /// The report split into chat-sized messages.
    #[must_use]
    pub fn messages(&self, config: &Config) -> Vec<String> {
        self.report
            .chunks(config.chat_preformatted, DISCORD_MESSAGE_LIMIT)
    }
}

/// Crawl the configured forum for posts after `checkpoint` and build the report.
///
/// # Errors
///
/// Returns an error if the forum root cannot be fetched.
pub async fn build_digest<S: PageSource>(
    source: S,
    config: &Config,
    checkpoint: DateTime<Utc>,
) -> Result<Digest, CrawlError> {
    let context = CrawlContext::new(checkpoint, DateNormalizer::new(config.forum_utc_offset));
    let crawler = Crawler::new(source, context);

    let posts = crawler.crawl(&config.forum_root_url).await?;
    let groups = summarize(&posts);
    let report = Report::render(
        &groups,
        &config.forum_root_url,
        checkpoint,
        config.forum_utc_offset,
    );

    Ok(Digest {
        checkpoint,
        posts,
        groups,
        report,
    })
}
