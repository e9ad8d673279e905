//! Per-title activity summary and the rendered report.

use chrono::{DateTime, FixedOffset, Utc};
use url::Url;

use crate::forum::{collapse_whitespace, PostSet};

const FENCE: &str = "```";

/// Activity under one thread title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleGroup {
    pub title: String,
    /// Distinct authors in order of first appearance.
    pub participants: Vec<String>,
    pub posts: usize,
}

impl TitleGroup {
    fn line(&self) -> String {
        match (self.posts, self.participants.as_slice()) {
            (1, [author]) => format!("{} - 1 post by {author}", self.title),
            (posts, participants) => format!(
                "{} - {posts} posts from {} {}",
                self.title,
                participants.len(),
                plural(participants.len(), "user")
            ),
        }
    }
}

/// Group posts by whitespace-collapsed title, in order of first appearance.
#[must_use]
pub fn summarize(posts: &PostSet) -> Vec<TitleGroup> {
    let mut groups: Vec<TitleGroup> = Vec::new();

    for post in posts {
        let title = collapse_whitespace(&post.title);
        let author = collapse_whitespace(&post.author);

        match groups.iter_mut().find(|group| group.title == title) {
            Some(group) => {
                group.posts += 1;
                if !group.participants.contains(&author) {
                    group.participants.push(author);
                }
            }
            None => groups.push(TitleGroup {
                title,
                participants: vec![author],
                posts: 1,
            }),
        }
    }

    groups
}

/// The digest message: a header line and one line per title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub header: String,
    pub lines: Vec<String>,
}

impl Report {
    /// Build the report for `groups`.
    ///
    /// The checkpoint is shown in the forum's own time zone.
    #[must_use]
    pub fn render(
        groups: &[TitleGroup],
        root_url: &Url,
        checkpoint: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        let total: usize = groups.iter().map(|group| group.posts).sum();
        let since = checkpoint
            .with_timezone(&offset)
            .format("%I:%M%p on %A (%D)");

        let mut header = if total == 1 {
            format!("There is 1 new post on {root_url} since {since}")
        } else {
            format!("There are {total} new posts on {root_url} since {since}")
        };
        if total > 0 {
            header.push(':');
        }

        Self {
            header,
            lines: groups.iter().map(TitleGroup::line).collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The whole report as one message.
    #[must_use]
    pub fn to_text(&self, preformatted: bool) -> String {
        let lines: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        render_chunk(Some(&self.header), &lines, preformatted)
    }

    /// Split the report into messages of at most `limit` characters.
    ///
    /// Splits fall between title lines. The header goes in the first message
    /// and every message that carries title lines gets its own fence. A title
    /// line too long for a message on its own is cut short.
    #[must_use]
    pub fn chunks(&self, preformatted: bool, limit: usize) -> Vec<String> {
        if self.lines.is_empty() {
            return vec![self.header.clone()];
        }

        // "```\n" before the lines and "\n```" after them
        let fence = if preformatted { 2 * (FENCE.len() + 1) } else { 0 };

        let mut chunks = Vec::new();
        let mut header = Some(self.header.as_str());
        let mut batch: Vec<&str> = Vec::new();
        let mut used = 0;

        for line in &self.lines {
            let overhead = fence + header.map_or(0, |h| h.chars().count() + 1);
            let budget = limit.saturating_sub(overhead);
            let line = truncate_chars(line, budget);
            let cost = line.chars().count() + usize::from(!batch.is_empty());

            if !batch.is_empty() && used + cost > budget {
                chunks.push(render_chunk(header.take(), &batch, preformatted));
                batch.clear();
                used = 0;
            }

            used += line.chars().count() + usize::from(!batch.is_empty());
            batch.push(line);
        }

        chunks.push(render_chunk(header, &batch, preformatted));
        chunks
    }
}

fn render_chunk(header: Option<&str>, lines: &[&str], preformatted: bool) -> String {
    let mut text = String::new();
    if let Some(header) = header {
        text.push_str(header);
        if lines.is_empty() {
            return text;
        }
        text.push('\n');
    }

    let body = lines.join("\n");
    if preformatted {
        text.push_str(FENCE);
        text.push('\n');
        text.push_str(&body);
        text.push('\n');
        text.push_str(FENCE);
    } else {
        text.push_str(&body);
    }
    text
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
