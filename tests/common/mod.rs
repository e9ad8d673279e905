//! Markup builders and page sources shared by the integration tests.
//!
//! The builders produce the same vBulletin 4 structure the forum serves,
//! reduced to the elements the parser looks at.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use forum_digest::crawler::{CrawlContext, Crawler};
use forum_digest::dates::DateNormalizer;
use forum_digest::fetch::{FetchError, PageSource, StaticPages};
use url::Url;

pub const BASE: &str = "http://forum.example.com";

pub fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

pub fn checkpoint() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

pub fn crawler<S: PageSource>(source: S) -> Crawler<S> {
    Crawler::new(source, CrawlContext::new(checkpoint(), DateNormalizer::utc()))
}

/// A child forum row. `last` is the displayed date and time of the newest
/// post; `None` renders the row the way locked forums appear.
pub fn forum_row(name: &str, href: &str, last: Option<(&str, &str)>) -> String {
    let activity = match last {
        Some((date, time)) => format!(
            r#"<p class="lastpostdate understate">{date} <span class="time">{time}</span></p>"#
        ),
        None => "<p>Private forum</p>".to_string(),
    };
    format!(
        r#"<li class="forumbit_post L1">
  <div class="forumrow">
    <h2 class="forumtitle"><a href="{href}">{name}</a></h2>
    {activity}
  </div>
</li>"#
    )
}

/// A thread row linking to the thread's newest post at `href`.
pub fn thread_row(title: &str, href: &str, last: Option<(&str, &str)>) -> String {
    let last_post = match last {
        Some((date, time)) => format!(
            r#"<dl class="threadlastpost td">
    <dt class="lastpostby">by <a href="member.php?1">someone</a></dt>
    <dd><a href="member.php?1">someone</a></dd>
    <dd>{date} <span class="time">{time}</span>
      <a class="lastpostdate understate" href="{href}"><img alt="Go to last post" /></a>
    </dd>
  </dl>"#
        ),
        None => String::new(),
    };
    format!(
        r#"<li class="threadbit">
  <h3 class="threadtitle"><a class="title" href="{href}">{title}</a></h3>
  {last_post}
</li>"#
    )
}

pub fn forum_page(forums: &[String], threads: &[String]) -> String {
    format!(
        r#"<html><body>
<ol class="childforum">
{}
</ol>
<ol id="threads">
{}
</ol>
</body></html>"#,
        forums.join("\n"),
        threads.join("\n")
    )
}

pub struct PostFixture {
    pub id: String,
    pub date: String,
    pub time: String,
    pub title: Option<String>,
    pub author: String,
}

impl PostFixture {
    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}

pub fn post(id: &str, date: &str, time: &str, author: &str) -> PostFixture {
    PostFixture {
        id: id.to_string(),
        date: date.to_string(),
        time: time.to_string(),
        title: None,
        author: author.to_string(),
    }
}

fn render_post(entry: &PostFixture) -> String {
    let title = entry
        .title
        .as_ref()
        .map(|t| format!(r#"<h2 class="title icon">{t}</h2>"#))
        .unwrap_or_default();
    format!(
        r#"<li class="postbitim postcontainer" id="post_{id}">
  <div class="posthead">
    <span class="postdate"><span class="date">{date},&nbsp;<span class="time">{time}</span></span></span>
    <span class="nodecontrols"><a class="postcounter" href="showthread.php?p={id}#post{id}">#{id}</a></span>
  </div>
  <div class="postdetails">
    <a class="username offline" href="member.php?u={author}"><strong>{author}</strong></a>
    {title}
  </div>
</li>"#,
        id = entry.id,
        date = entry.date,
        time = entry.time,
        author = entry.author,
    )
}

/// One thread page. `pages` lists `(number, href)` for the pagination
/// control; the entry equal to `current` is rendered as selected.
pub fn thread_page(
    title: &str,
    posts: &[PostFixture],
    current: u32,
    pages: &[(u32, String)],
) -> String {
    let posts: Vec<String> = posts.iter().map(render_post).collect();
    let pagination = if pages.is_empty() {
        String::new()
    } else {
        let links: Vec<String> = pages
            .iter()
            .map(|(number, href)| {
                if *number == current {
                    format!(r#"<span class="selected"><a href="javascript://">{number}</a></span>"#)
                } else {
                    format!(r#"<span><a href="{href}">{number}</a></span>"#)
                }
            })
            .collect();
        format!(
            r#"<form class="pagination popupmenu" action="showthread.php">{}</form>"#,
            links.join("")
        )
    };
    format!(
        r#"<html><head><title>{title} - Forum</title></head><body>
<span class="threadtitle"><a href="showthread.php">{title}</a></span>
<ol id="posts">
{}
</ol>
{pagination}
</body></html>"#,
        posts.join("\n")
    )
}

/// Records every URL it is asked for before delegating to [`StaticPages`].
#[derive(Default)]
pub struct RecordingPages {
    pub pages: StaticPages,
    pub requests: Mutex<Vec<String>>,
}

impl RecordingPages {
    pub fn new(pages: StaticPages) -> Self {
        Self {
            pages,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.as_str() == url).count()
    }
}

#[async_trait]
impl PageSource for RecordingPages {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages.fetch(url).await
    }
}
