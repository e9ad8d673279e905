use std::collections::HashSet;

use chrono::{DateTime, Utc};
use url::Url;

/// Date and time tokens exactly as the forum displays them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTimestamp {
    pub date: String,
    pub time: String,
}

/// A post entry parsed from a thread page, before date resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostEntry {
    /// Forum-assigned element id such as `post_4567`.
    pub id: Option<String>,
    /// Sequence label within the thread, e.g. `#12`.
    pub sequence: String,
    pub posted: Option<RawTimestamp>,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// A link in a thread's pagination controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: u32,
    pub url: Url,
}

/// Pagination controls of a thread page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub pages: Vec<PageLink>,
}

impl Pagination {
    /// The link to the page before the current one, if any.
    #[must_use]
    pub fn previous(&self) -> Option<&Url> {
        let wanted = self.current.checked_sub(1).filter(|n| *n >= 1)?;
        self.pages
            .iter()
            .find(|link| link.number == wanted)
            .map(|link| &link.url)
    }
}

/// One page of a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadPage {
    /// Thread title from the page heading, used when a post has no title.
    pub title: Option<String>,
    pub posts: Vec<PostEntry>,
    pub pagination: Option<Pagination>,
}

/// A child forum listed on a forum or category page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumRow {
    pub name: String,
    pub url: Url,
    /// Missing when the forum hides its activity, i.e. it is locked to us.
    pub last_activity: Option<RawTimestamp>,
}

/// A thread listed on a forum page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRow {
    pub title: String,
    /// Link to the thread's latest post.
    pub url: Option<Url>,
    pub last_post: Option<RawTimestamp>,
}

/// A forum or category page: child forums and threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForumPage {
    pub subforums: Vec<ForumRow>,
    pub threads: Vec<ThreadRow>,
}

/// Stable identity of a post within one crawl.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostKey {
    /// Normalized URL the thread was entered through.
    pub thread: String,
    /// Post element id, or the sequence label when the id is missing.
    pub post: String,
}

/// A post newer than the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub key: PostKey,
    pub sequence: String,
    pub title: String,
    pub author: String,
    pub posted_at: DateTime<Utc>,
}

/// Posts in discovery order, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct PostSet {
    posts: Vec<Post>,
    keys: HashSet<PostKey>,
}

impl PostSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `post`, returning `false` if a post with the same key is present.
    pub fn insert(&mut self, post: Post) -> bool {
        if !self.keys.insert(post.key.clone()) {
            return false;
        }
        self.posts.push(post);
        true
    }

    /// Union `other` into this set, keeping this set's order first.
    pub fn merge(&mut self, other: PostSet) {
        self.extend(other.posts);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Post> {
        self.posts.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Post> {
        self.posts
    }
}

impl Extend<Post> for PostSet {
    fn extend<I: IntoIterator<Item = Post>>(&mut self, iter: I) {
        for post in iter {
            self.insert(post);
        }
    }
}

impl FromIterator<Post> for PostSet {
    fn from_iter<I: IntoIterator<Item = Post>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for PostSet {
    type Item = Post;
    type IntoIter = std::vec::IntoIter<Post>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.into_iter()
    }
}

impl<'a> IntoIterator for &'a PostSet {
    type Item = &'a Post;
    type IntoIter = std::slice::Iter<'a, Post>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.iter()
    }
}
