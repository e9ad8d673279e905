use tracing::{debug, trace, warn};
use url::Url;

use super::{indent, merge_counting, Crawler};
use crate::fetch::{FetchError, PageSource};
use crate::forum::{PostSet, ThreadRow};

impl<S: PageSource> Crawler<S> {
    /// Collect new posts from the threads listed on a forum page.
    ///
    /// # Errors
    ///
    /// Returns an error if the forum page cannot be fetched. Failures on
    /// individual threads are logged and skipped.
    pub async fn crawl_forum(&self, forum_url: &Url) -> Result<PostSet, FetchError> {
        let page = self.fetch_forum_page(forum_url).await?;
        Ok(self.scan_threads(&page.threads, 0).await)
    }

    /// Crawl every listed thread whose last post is newer than the checkpoint.
    pub(super) async fn scan_threads(&self, threads: &[ThreadRow], depth: usize) -> PostSet {
        let prefix = indent(depth);
        let mut posts = PostSet::new();

        for row in threads {
            // Announcements and moved-thread stubs have no last-post block.
            let Some(raw) = &row.last_post else {
                trace!("{prefix}No last post for thread {}", row.title);
                continue;
            };

            let last_post = match self.context.resolve(raw) {
                Ok(last_post) => last_post,
                Err(e) => {
                    debug!("{prefix}Skipping thread {}: {e}", row.title);
                    continue;
                }
            };

            if !self.context.is_new(&last_post) {
                trace!("{prefix}No new posts in {} ({last_post})", row.title);
                continue;
            }

            let Some(url) = &row.url else {
                debug!("{prefix}No link to the latest post of {}", row.title);
                continue;
            };

            debug!("{prefix}{} has new posts ({last_post})", row.title);
            match self.crawl_thread(url).await {
                Ok(found) => {
                    let added = merge_counting(&mut posts, found);
                    trace!("{prefix}{added} new posts from {}", row.title);
                }
                Err(e) => warn!(thread = %row.title, "Skipping thread: {e}"),
            }
        }

        posts
    }
}
