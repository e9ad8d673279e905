//! Forum crawl: categories, forums, then threads.
//!
//! The crawl is strictly sequential. Each level merges what its children
//! found into a [`PostSet`]; failures below the root are logged and cost only
//! the subtree they happened in.

mod forum;
mod subforum;
mod thread;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::dates::{DateError, DateNormalizer, PostedAt};
use crate::fetch::{FetchError, PageSource};
use crate::forum::{markup, ForumPage, PostSet, RawTimestamp, ThreadPage};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to fetch forum root {url}")]
    Root {
        url: String,
        #[source]
        source: FetchError,
    },
}

/// Immutable state shared by every step of one crawl.
#[derive(Debug, Clone, Copy)]
pub struct CrawlContext {
    /// Posts at or before this instant were reported by an earlier run.
    pub checkpoint: DateTime<Utc>,
    pub normalizer: DateNormalizer,
}

impl CrawlContext {
    #[must_use]
    pub fn new(checkpoint: DateTime<Utc>, normalizer: DateNormalizer) -> Self {
        Self {
            checkpoint,
            normalizer,
        }
    }

    /// Resolve a displayed date and time.
    ///
    /// # Errors
    ///
    /// Returns an error if the time token is malformed.
    pub fn resolve(&self, raw: &RawTimestamp) -> Result<PostedAt, DateError> {
        self.normalizer.normalize(&raw.date, &raw.time)
    }

    /// Whether `posted` is strictly after the checkpoint.
    #[must_use]
    pub fn is_new(&self, posted: &PostedAt) -> bool {
        posted.is_after(self.checkpoint)
    }
}

/// Walks a forum through a [`PageSource`].
pub struct Crawler<S> {
    source: S,
    context: CrawlContext,
}

impl<S: PageSource> Crawler<S> {
    pub fn new(source: S, context: CrawlContext) -> Self {
        Self { source, context }
    }

    pub fn context(&self) -> &CrawlContext {
        &self.context
    }

    /// Crawl the whole forum tree under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root page itself cannot be fetched.
    pub async fn crawl(&self, root: &Url) -> Result<PostSet, CrawlError> {
        info!(root = %root, checkpoint = %self.context.checkpoint, "Starting crawl");
        self.crawl_subforum(root)
            .await
            .map_err(|source| CrawlError::Root {
                url: root.to_string(),
                source,
            })
    }

    async fn fetch_thread_page(&self, url: &Url) -> Result<ThreadPage, FetchError> {
        let body = self.source.fetch(url).await?;
        Ok(markup::parse_thread_page(&body, url))
    }

    async fn fetch_forum_page(&self, url: &Url) -> Result<ForumPage, FetchError> {
        let body = self.source.fetch(url).await?;
        Ok(markup::parse_forum_page(&body, url))
    }
}

/// Log prefix showing how deep in the forum tree a message comes from.
fn indent(depth: usize) -> String {
    "--".repeat(depth)
}

/// Merge a child's result into `posts`, returning how many were new.
fn merge_counting(posts: &mut PostSet, found: PostSet) -> usize {
    let before = posts.len();
    posts.merge(found);
    posts.len() - before
}
