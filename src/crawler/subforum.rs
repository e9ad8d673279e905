use std::collections::HashSet;

use tracing::{debug, info, trace, warn};
use url::Url;

use super::{indent, merge_counting, Crawler};
use crate::fetch::{FetchError, PageSource};
use crate::forum::{normalize_url, ForumRow, PostSet};

impl<S: PageSource> Crawler<S> {
    /// Collect new posts from every forum reachable from the category at
    /// `forum_url`.
    ///
    /// The forum tree is walked depth first with an explicit stack. Each URL
    /// is visited at most once, so forums that list themselves or each other
    /// as children don't loop. Forums that don't show a last-post date are
    /// treated as inaccessible and skipped along with their children.
    ///
    /// The root's own threads are scanned only when the root lists itself as
    /// an accessible forum; a plain category page has no threads of its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the root page cannot be fetched. Failures below the
    /// root are logged and skipped.
    pub async fn crawl_subforum(&self, forum_url: &Url) -> Result<PostSet, FetchError> {
        let root = self.fetch_forum_page(forum_url).await?;

        let root_key = normalize_url(forum_url);
        let mut visited = HashSet::from([root_key.clone()]);
        let mut stack = Vec::new();
        let lists_itself =
            self.queue_children(&root.subforums, &root_key, 0, &mut visited, &mut stack);

        let mut posts = PostSet::new();
        let mut forums = 0usize;

        if lists_itself {
            forums += 1;
            let found = self.scan_threads(&root.threads, 0).await;
            let added = merge_counting(&mut posts, found);
            trace!("{added} new posts in [{forum_url}]");
        }

        while let Some((url, depth)) = stack.pop() {
            let page = match self.fetch_forum_page(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %url, "Skipping forum: {e}");
                    continue;
                }
            };
            forums += 1;

            let found = self.scan_threads(&page.threads, depth).await;
            let added = merge_counting(&mut posts, found);
            trace!("{}{added} new posts in [{url}]", indent(depth));

            let page_key = normalize_url(&url);
            self.queue_children(&page.subforums, &page_key, depth + 1, &mut visited, &mut stack);
        }

        info!(forums, posts = posts.len(), "Forum crawl complete");
        Ok(posts)
    }

    /// Push the accessible, unvisited forums among `rows` so that they pop in
    /// page order.
    ///
    /// Returns whether the page keyed `page_key` lists itself as an
    /// accessible forum. That row is never queued.
    fn queue_children(
        &self,
        rows: &[ForumRow],
        page_key: &str,
        depth: usize,
        visited: &mut HashSet<String>,
        stack: &mut Vec<(Url, usize)>,
    ) -> bool {
        let mut lists_itself = false;
        let prefix = indent(depth);
        let mut queued = Vec::new();

        for row in rows {
            let Some(raw) = &row.last_activity else {
                debug!("{prefix}No access to {} [{}]", row.name, row.url);
                continue;
            };

            match self.context.resolve(raw) {
                Ok(last_post) => debug!("{prefix}{} [{}; {last_post}]", row.name, row.url),
                Err(e) => {
                    debug!("{prefix}No access to {} [{}]: {e}", row.name, row.url);
                    continue;
                }
            }

            let key = normalize_url(&row.url);
            if key == page_key {
                trace!("{prefix}{} [{}] is the current page", row.name, row.url);
                lists_itself = true;
                continue;
            }

            if !visited.insert(key) {
                trace!("{prefix}Already visited {} [{}]", row.name, row.url);
                continue;
            }

            queued.push((row.url.clone(), depth));
        }

        stack.extend(queued.into_iter().rev());
        lists_itself
    }
}
