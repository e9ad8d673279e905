//! Parsing of the forum's HTML into typed page values.
//!
//! Selectors follow the vBulletin 4 templates the forum uses. Class matching is
//! by substring (`[class*=...]`) because rows carry extra state classes such as
//! `threadbit new` or `postbitim postcontainer old`.
//!
//! Everything here is best effort: elements that are missing yield `None`
//! fields or skipped rows, never errors.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::trace;
use url::Url;

use super::collapse_whitespace;
use super::models::{
    ForumPage, ForumRow, PageLink, Pagination, PostEntry, RawTimestamp, ThreadPage, ThreadRow,
};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid selector")
}

static BASE: LazyLock<Selector> = LazyLock::new(|| selector("base[href]"));
static TIME: LazyLock<Selector> = LazyLock::new(|| selector(r#"span[class*="time"]"#));

// Thread pages
static POST: LazyLock<Selector> = LazyLock::new(|| selector(r#"li[class*="postbitim"]"#));
static POST_HEAD: LazyLock<Selector> = LazyLock::new(|| selector(r#"div[class*="posthead"]"#));
static POST_COUNTER: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"a[class*="postcounter"]"#));
static POST_DATE: LazyLock<Selector> = LazyLock::new(|| selector(r#"span[class*="date"]"#));
static POST_TITLE: LazyLock<Selector> = LazyLock::new(|| selector(r#"h2[class*="title"]"#));
static USERNAME_INNER: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"a[class*="username"] > *"#));
static USERNAME: LazyLock<Selector> = LazyLock::new(|| selector(r#"[class*="username"]"#));
static THREAD_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"span[class*="threadtitle"]"#));
static DOC_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static PAGINATION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"form[class*="pagination"]"#));
static PAGE_SELECTED: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"span[class*="selected"] > a[href]"#));
static PAGE_LINK: LazyLock<Selector> = LazyLock::new(|| selector("span > a[href]"));

// Forum listings
static THREAD_ROW: LazyLock<Selector> = LazyLock::new(|| selector(r#"li[class*="threadbit"]"#));
static THREAD_LAST_POST: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"dl[class*="threadlastpost"]"#));
static THREAD_LAST_POST_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"a[class*="lastpostdate"][href]"#));
static THREAD_ROW_TITLE: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[class*="title"]"#));
static FORUM_ROW: LazyLock<Selector> = LazyLock::new(|| selector(r#"li[class*="forumbit_post"]"#));
static FORUM_TITLE_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"h2[class*="forumtitle"] > a[href]"#));
static FORUM_LAST_POST: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"p[class*="lastpostdate"]"#));

/// Parse one page of a thread fetched from `page_url`.
#[must_use]
pub fn parse_thread_page(html: &str, page_url: &Url) -> ThreadPage {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);

    let posts = document.select(&POST).map(parse_post).collect();

    let title = document
        .select(&THREAD_TITLE)
        .next()
        .or_else(|| document.select(&DOC_TITLE).next())
        .map(element_text)
        .filter(|t| !t.is_empty());

    let pagination = document
        .select(&PAGINATION)
        .next()
        .and_then(|nav| parse_pagination(nav, &base));

    ThreadPage {
        title,
        posts,
        pagination,
    }
}

/// Parse a forum or category page fetched from `page_url`.
#[must_use]
pub fn parse_forum_page(html: &str, page_url: &Url) -> ForumPage {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);

    let subforums = document
        .select(&FORUM_ROW)
        .filter_map(|row| parse_forum_row(row, &base))
        .collect();

    let threads = document
        .select(&THREAD_ROW)
        .map(|row| parse_thread_row(row, &base))
        .collect();

    ForumPage { subforums, threads }
}

fn parse_post(post: ElementRef<'_>) -> PostEntry {
    let id = post
        .value()
        .id()
        .map(ToString::to_string)
        .filter(|id| !id.is_empty());

    let head = post.select(&POST_HEAD).next();

    let sequence = head
        .and_then(|head| head.select(&POST_COUNTER).next())
        .map(element_text)
        .unwrap_or_default();

    // The first match is the `postdate` wrapper, the second the date itself.
    let posted = head
        .and_then(|head| head.select(&POST_DATE).nth(1))
        .and_then(timestamp_in);

    let title = post
        .select(&POST_TITLE)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty());

    let author = post
        .select(&USERNAME_INNER)
        .next()
        .or_else(|| post.select(&USERNAME).next())
        .map(element_text)
        .filter(|a| !a.is_empty());

    PostEntry {
        id,
        sequence,
        posted,
        title,
        author,
    }
}

fn parse_pagination(nav: ElementRef<'_>, base: &Url) -> Option<Pagination> {
    let current = nav
        .select(&PAGE_SELECTED)
        .next()
        .and_then(|a| element_text(a).parse().ok())?;

    let pages = nav
        .select(&PAGE_LINK)
        .filter_map(|a| {
            let number = element_text(a).parse().ok()?;
            let url = resolve(base, a.value().attr("href")?)?;
            Some(PageLink { number, url })
        })
        .collect();

    Some(Pagination { current, pages })
}

fn parse_thread_row(row: ElementRef<'_>, base: &Url) -> ThreadRow {
    let title = row
        .select(&THREAD_ROW_TITLE)
        .next()
        .map(element_text)
        .unwrap_or_default();

    // `dl.threadlastpost` holds the author in the first `dd`, the date in the second.
    let last_post = row
        .select(&THREAD_LAST_POST)
        .next()
        .and_then(|dl| {
            dl.children()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == "dd")
                .nth(1)
        })
        .and_then(timestamp_in);

    let url = row
        .select(&THREAD_LAST_POST_LINK)
        .next()
        .and_then(|a| resolve(base, a.value().attr("href")?));

    ThreadRow {
        title,
        url,
        last_post,
    }
}

fn parse_forum_row(row: ElementRef<'_>, base: &Url) -> Option<ForumRow> {
    let Some(link) = row.select(&FORUM_TITLE_LINK).next() else {
        trace!("Forum row without a title link");
        return None;
    };
    let url = resolve(base, link.value().attr("href")?)?;
    let name = element_text(link);

    let last_activity = row
        .select(&FORUM_LAST_POST)
        .next()
        .and_then(timestamp_in);

    Some(ForumRow {
        name,
        url,
        last_activity,
    })
}

/// Read a date/time pair laid out as `Date,&nbsp;<span class="time">HH:MM</span>`.
///
/// The date is the element's own leading text; the time is the first nested
/// `time` span.
fn timestamp_in(element: ElementRef<'_>) -> Option<RawTimestamp> {
    let time = element.select(&TIME).next()?;
    Some(RawTimestamp {
        date: leading_text(element),
        time: time.text().collect(),
    })
}

/// Text nodes of `element` that come before its first child element.
fn leading_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.children() {
        match node.value().as_text() {
            Some(text) => out.push_str(text),
            None if node.value().is_comment() => {}
            None => break,
        }
    }
    out
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// The URL relative links resolve against: `<base href>` if present.
fn document_base(document: &Html, page_url: &Url) -> Url {
    document
        .select(&BASE)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn resolve(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}
