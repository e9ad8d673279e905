//! Integration tests for the forum crawl over in-memory pages.

mod common;

use common::{
    crawler, forum_page, forum_row, post, thread_page, thread_row, url, RecordingPages,
};
use forum_digest::fetch::{FetchError, StaticPages};
use forum_digest::summary::summarize;
use url::Url;

fn parse(path: &str) -> Url {
    Url::parse(&url(path)).unwrap()
}

fn pages3(thread: u32) -> Vec<(u32, String)> {
    (1..=3)
        .map(|n| (n, url(&format!("/threads/{thread}/page{n}"))))
        .collect()
}

fn keys(posts: &forum_digest::forum::PostSet) -> Vec<String> {
    posts.iter().map(|p| p.key.post.clone()).collect()
}

#[tokio::test]
async fn test_thread_walks_back_while_pages_have_new_posts() {
    let pages = StaticPages::new()
        .with_page(
            &url("/threads/1/page3"),
            thread_page(
                "LAN party",
                &[
                    post("5", "02-06-2024", "10:00", "Alice"),
                    post("6", "02-06-2024", "11:00", "Bob"),
                ],
                3,
                &pages3(1),
            ),
        )
        .with_page(
            &url("/threads/1/page2"),
            thread_page(
                "LAN party",
                &[
                    post("3", "31-05-2024", "09:00", "Carol"),
                    post("4", "01-06-2024", "08:00", "Alice"),
                ],
                2,
                &pages3(1),
            ),
        )
        .with_page(
            &url("/threads/1/page1"),
            thread_page(
                "LAN party",
                &[
                    post("1", "30-05-2024", "09:00", "Alice"),
                    post("2", "30-05-2024", "10:00", "Bob"),
                ],
                1,
                &pages3(1),
            ),
        );
    let source = RecordingPages::new(pages);

    let posts = crawler(&source)
        .crawl_thread(&parse("/threads/1/page3"))
        .await
        .unwrap();

    assert_eq!(keys(&posts), ["post_5", "post_6", "post_4"]);
    assert!(posts.iter().all(|p| p.title == "LAN party"));
    assert_eq!(
        source.requests(),
        [
            url("/threads/1/page3"),
            url("/threads/1/page2"),
            url("/threads/1/page1")
        ]
    );
}

#[tokio::test]
async fn test_thread_stops_at_first_page_without_new_posts() {
    let pages = StaticPages::new()
        .with_page(
            &url("/threads/1/page3"),
            thread_page(
                "LAN party",
                &[post("5", "02-06-2024", "10:00", "Alice")],
                3,
                &pages3(1),
            ),
        )
        .with_page(
            &url("/threads/1/page2"),
            thread_page(
                "LAN party",
                &[post("3", "31-05-2024", "09:00", "Carol")],
                2,
                &pages3(1),
            ),
        );
    let source = RecordingPages::new(pages);

    let posts = crawler(&source)
        .crawl_thread(&parse("/threads/1/page3"))
        .await
        .unwrap();

    assert_eq!(keys(&posts), ["post_5"]);
    assert_eq!(source.count(&url("/threads/1/page1")), 0);
}

#[tokio::test]
async fn test_post_at_checkpoint_is_not_new() {
    let pages = StaticPages::new().with_page(
        &url("/threads/2"),
        thread_page(
            "Midnight",
            &[
                post("1", "01-06-2024", "00:00", "Alice"),
                post("2", "01-06-2024", "00:01", "Bob"),
            ],
            1,
            &[],
        ),
    );

    let posts = crawler(pages)
        .crawl_thread(&parse("/threads/2"))
        .await
        .unwrap();

    assert_eq!(keys(&posts), ["post_2"]);
}

#[tokio::test]
async fn test_malformed_post_time_skips_only_that_post() {
    let pages = StaticPages::new().with_page(
        &url("/threads/3"),
        thread_page(
            "Clock trouble",
            &[
                post("1", "02-06-2024", "noon", "Alice"),
                post("2", "02-06-2024", "12:30", "Bob").titled("Re: Clock trouble"),
            ],
            1,
            &[],
        ),
    );

    let posts = crawler(pages)
        .crawl_thread(&parse("/threads/3"))
        .await
        .unwrap();

    assert_eq!(keys(&posts), ["post_2"]);
    assert_eq!(posts.iter().next().unwrap().title, "Re: Clock trouble");
}

#[tokio::test]
async fn test_unparseable_post_date_is_not_new() {
    let pages = StaticPages::new().with_page(
        &url("/threads/4"),
        thread_page(
            "Odd dates",
            &[post("1", "Last Tuesday", "10:00", "Alice")],
            1,
            &[],
        ),
    );

    let posts = crawler(pages)
        .crawl_thread(&parse("/threads/4"))
        .await
        .unwrap();

    assert!(posts.is_empty());
}

#[tokio::test]
async fn test_forum_crawls_only_threads_with_new_activity() {
    let pages = StaticPages::new()
        .with_page(
            &url("/forums/general"),
            forum_page(
                &[],
                &[
                    thread_row("Fresh", &url("/threads/10"), Some(("02-06-2024", "10:00"))),
                    thread_row("Stale", &url("/threads/11"), Some(("30-05-2024", "10:00"))),
                    thread_row("Announcement", &url("/threads/12"), None),
                ],
            ),
        )
        .with_page(
            &url("/threads/10"),
            thread_page(
                "Fresh",
                &[post("100", "02-06-2024", "10:00", "Alice")],
                1,
                &[],
            ),
        );
    let source = RecordingPages::new(pages);

    let posts = crawler(&source)
        .crawl_forum(&parse("/forums/general"))
        .await
        .unwrap();

    assert_eq!(keys(&posts), ["post_100"]);
    assert_eq!(source.count(&url("/threads/11")), 0);
    assert_eq!(source.count(&url("/threads/12")), 0);
}

#[tokio::test]
async fn test_failed_thread_does_not_stop_its_siblings() {
    let pages = StaticPages::new()
        .with_page(
            &url("/forums/general"),
            forum_page(
                &[],
                &[
                    thread_row("Gone", &url("/threads/missing"), Some(("02-06-2024", "09:00"))),
                    thread_row("Here", &url("/threads/20"), Some(("02-06-2024", "10:00"))),
                ],
            ),
        )
        .with_page(
            &url("/threads/20"),
            thread_page(
                "Here",
                &[post("200", "02-06-2024", "10:00", "Bob")],
                1,
                &[],
            ),
        );

    let posts = crawler(pages)
        .crawl_forum(&parse("/forums/general"))
        .await
        .unwrap();

    assert_eq!(keys(&posts), ["post_200"]);
}

#[tokio::test]
async fn test_subforum_walk_survives_cycles() {
    let pages = StaticPages::new()
        .with_page(
            &url("/forum.php"),
            forum_page(
                &[forum_row("A", &url("/forums/a"), Some(("02-06-2024", "10:00")))],
                &[],
            ),
        )
        .with_page(
            &url("/forums/a"),
            forum_page(
                &[
                    forum_row("A", &url("/forums/a/"), Some(("02-06-2024", "10:00"))),
                    forum_row("Home", &url("/forum.php?s=abc123"), Some(("02-06-2024", "10:00"))),
                    forum_row("B", &url("/forums/b"), Some(("02-06-2024", "10:00"))),
                ],
                &[thread_row("Loop", &url("/threads/30"), Some(("02-06-2024", "10:00")))],
            ),
        )
        .with_page(
            &url("/forums/b"),
            forum_page(
                &[forum_row("A", &url("/forums/a"), Some(("02-06-2024", "10:00")))],
                &[],
            ),
        )
        .with_page(
            &url("/threads/30"),
            thread_page(
                "Loop",
                &[post("300", "02-06-2024", "10:00", "Alice")],
                1,
                &[],
            ),
        );
    let source = RecordingPages::new(pages);

    let posts = crawler(&source)
        .crawl_subforum(&parse("/forum.php"))
        .await
        .unwrap();

    assert_eq!(keys(&posts), ["post_300"]);
    assert_eq!(source.count(&url("/forum.php")), 1);
    assert_eq!(source.count(&url("/forums/a")), 1);
    assert_eq!(source.count(&url("/forums/b")), 1);
    assert_eq!(source.requests().len(), 4);
}

#[tokio::test]
async fn test_subforum_skips_locked_forums() {
    let pages = StaticPages::new()
        .with_page(
            &url("/forum.php"),
            forum_page(
                &[
                    forum_row("Staff", &url("/forums/staff"), None),
                    forum_row("Broken clock", &url("/forums/clock"), Some(("Today", "noon"))),
                    forum_row("Public", &url("/forums/public"), Some(("02-06-2024", "10:00"))),
                ],
                &[],
            ),
        )
        .with_page(&url("/forums/public"), forum_page(&[], &[]));
    let source = RecordingPages::new(pages);

    let posts = crawler(&source)
        .crawl_subforum(&parse("/forum.php"))
        .await
        .unwrap();

    assert!(posts.is_empty());
    assert_eq!(
        source.requests(),
        [url("/forum.php"), url("/forums/public")]
    );
}

#[tokio::test]
async fn test_subforum_continues_past_failed_child() {
    let pages = StaticPages::new()
        .with_page(
            &url("/forum.php"),
            forum_page(
                &[
                    forum_row("Missing", &url("/forums/missing"), Some(("02-06-2024", "10:00"))),
                    forum_row("Games", &url("/forums/games"), Some(("02-06-2024", "10:00"))),
                ],
                &[],
            ),
        )
        .with_page(
            &url("/forums/games"),
            forum_page(
                &[],
                &[thread_row("Quake", &url("/threads/40"), Some(("02-06-2024", "10:00")))],
            ),
        )
        .with_page(
            &url("/threads/40"),
            thread_page(
                "Quake",
                &[post("400", "02-06-2024", "10:00", "Dave")],
                1,
                &[],
            ),
        );
    let source = RecordingPages::new(pages);

    let posts = crawler(&source)
        .crawl_subforum(&parse("/forum.php"))
        .await
        .unwrap();

    assert_eq!(keys(&posts), ["post_400"]);
    // Children are visited in page order.
    assert_eq!(
        source.requests()[1..3],
        [url("/forums/missing"), url("/forums/games")]
    );
}

#[tokio::test]
async fn test_thread_listed_twice_is_counted_once() {
    let shared = thread_row("Crosspost", &url("/threads/50"), Some(("02-06-2024", "10:00")));
    let pages = StaticPages::new()
        .with_page(
            &url("/forum.php"),
            forum_page(
                &[
                    forum_row("A", &url("/forums/a"), Some(("02-06-2024", "10:00"))),
                    forum_row("B", &url("/forums/b"), Some(("02-06-2024", "10:00"))),
                ],
                &[],
            ),
        )
        .with_page(&url("/forums/a"), forum_page(&[], &[shared.clone()]))
        .with_page(&url("/forums/b"), forum_page(&[], &[shared]))
        .with_page(
            &url("/threads/50"),
            thread_page(
                "Crosspost",
                &[
                    post("500", "02-06-2024", "09:00", "Alice"),
                    post("501", "02-06-2024", "10:00", "Bob"),
                ],
                1,
                &[],
            ),
        );

    let posts = crawler(pages)
        .crawl_subforum(&parse("/forum.php"))
        .await
        .unwrap();

    assert_eq!(posts.len(), 2);
    let groups = summarize(&posts);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].posts, 2);
    assert_eq!(groups[0].participants, ["Alice", "Bob"]);
}

#[tokio::test]
async fn test_root_threads_are_not_scanned() {
    let pages = StaticPages::new().with_page(
        &url("/forum.php"),
        forum_page(
            &[],
            &[thread_row("On the index", &url("/threads/60"), Some(("02-06-2024", "10:00")))],
        ),
    );
    let source = RecordingPages::new(pages);

    let posts = crawler(&source)
        .crawl_subforum(&parse("/forum.php"))
        .await
        .unwrap();

    assert!(posts.is_empty());
    assert_eq!(source.count(&url("/threads/60")), 0);
}

#[tokio::test]
async fn test_root_listing_itself_scans_its_threads() {
    let pages = StaticPages::new()
        .with_page(
            &url("/forumdisplay.php?f=2"),
            forum_page(
                &[
                    forum_row("Games", &url("/forumdisplay.php?f=2&s=abc123"), Some(("02-06-2024", "10:00"))),
                    forum_row("Retro", &url("/forumdisplay.php?f=7"), Some(("02-06-2024", "11:00"))),
                ],
                &[thread_row("Own thread", &url("/threads/61"), Some(("02-06-2024", "10:00")))],
            ),
        )
        .with_page(
            &url("/forumdisplay.php?f=7"),
            forum_page(
                &[],
                &[thread_row("Child thread", &url("/threads/62"), Some(("02-06-2024", "11:00")))],
            ),
        )
        .with_page(
            &url("/threads/61"),
            thread_page("Own thread", &[post("610", "02-06-2024", "10:00", "Alice")], 1, &[]),
        )
        .with_page(
            &url("/threads/62"),
            thread_page("Child thread", &[post("620", "02-06-2024", "11:00", "Bob")], 1, &[]),
        );
    let source = RecordingPages::new(pages);

    let posts = crawler(&source)
        .crawl_subforum(&parse("/forumdisplay.php?f=2"))
        .await
        .unwrap();

    assert_eq!(keys(&posts), ["post_610", "post_620"]);
    assert_eq!(source.count(&url("/forumdisplay.php?f=2")), 1);
    assert_eq!(source.requests().len(), 4);
}

#[tokio::test]
async fn test_root_failure_is_an_error() {
    let result = crawler(StaticPages::new())
        .crawl_subforum(&parse("/forum.php"))
        .await;

    assert!(matches!(result, Err(FetchError::NotFound(_))));
}
