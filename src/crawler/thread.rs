use std::collections::HashSet;

use tracing::{debug, trace, warn};
use url::Url;

use super::Crawler;
use crate::fetch::{FetchError, PageSource};
use crate::forum::{normalize_url, Pagination, Post, PostKey, PostSet, ThreadPage};

impl<S: PageSource> Crawler<S> {
    /// Collect the posts of a thread that are newer than the checkpoint.
    ///
    /// Starts at `thread_url`, normally the thread's last page, and walks
    /// backward one page at a time for as long as each page has at least one
    /// new post. Pages are in chronological order, so the first page without
    /// new posts means everything before it is old too.
    ///
    /// # Errors
    ///
    /// Returns an error if the first page cannot be fetched. A failure on an
    /// earlier page ends the walk but keeps what was already found.
    pub async fn crawl_thread(&self, thread_url: &Url) -> Result<PostSet, FetchError> {
        let thread_key = normalize_url(thread_url);
        debug!(thread = %thread_key, "Crawling thread");

        let mut posts = PostSet::new();
        let mut visited = HashSet::new();
        let mut next = Some(thread_url.clone());

        while let Some(page_url) = next.take() {
            if !visited.insert(normalize_url(&page_url)) {
                debug!(url = %page_url, "Thread page already scanned, stopping");
                break;
            }

            let page = match self.fetch_thread_page(&page_url).await {
                Ok(page) => page,
                Err(e) if visited.len() > 1 => {
                    warn!(url = %page_url, "Failed to fetch earlier thread page: {e}");
                    break;
                }
                Err(e) => return Err(e),
            };

            let found = self.new_posts_on_page(&thread_key, &page_url, &page);
            if found.is_empty() {
                trace!(url = %page_url, "No new posts on page");
                break;
            }
            debug!(url = %page_url, new_posts = found.len(), "Found new posts on page");
            posts.extend(found);

            next = page
                .pagination
                .as_ref()
                .and_then(Pagination::previous)
                .cloned();
        }

        Ok(posts)
    }

    /// The posts on one thread page that are newer than the checkpoint.
    fn new_posts_on_page(&self, thread_key: &str, page_url: &Url, page: &ThreadPage) -> Vec<Post> {
        let mut found = Vec::new();

        for (index, entry) in page.posts.iter().enumerate() {
            trace!(post = %entry.sequence, "Inspect post");

            let Some(raw) = &entry.posted else {
                debug!(post = %entry.sequence, url = %page_url, "Post has no date, skipping");
                continue;
            };

            let posted = match self.context.resolve(raw) {
                Ok(posted) => posted,
                Err(e) => {
                    warn!(post = %entry.sequence, url = %page_url, "Skipping post: {e}");
                    continue;
                }
            };

            let Some(posted_at) = posted.timestamp().filter(|_| self.context.is_new(&posted))
            else {
                continue;
            };

            let post = entry
                .id
                .clone()
                .or_else(|| Some(entry.sequence.clone()).filter(|s| !s.is_empty()))
                .unwrap_or_else(|| format!("{}#{index}", normalize_url(page_url)));

            let title = entry
                .title
                .clone()
                .or_else(|| page.title.clone())
                .unwrap_or_else(|| "(untitled)".to_string());

            debug!(post = %entry.sequence, %posted_at, "Post is new");
            found.push(Post {
                key: PostKey {
                    thread: thread_key.to_string(),
                    post,
                },
                sequence: entry.sequence.clone(),
                title,
                author: entry
                    .author
                    .clone()
                    .unwrap_or_else(|| "(unknown)".to_string()),
                posted_at,
            });
        }

        found
    }
}
