//! Forum data model and the markup parsing boundary.
//!
//! Pages come in as HTML strings and leave [`markup`] as plain values; the
//! crawler never sees a markup node.

pub mod markup;
mod models;
mod normalize;

pub use models::{
    ForumPage, ForumRow, PageLink, Pagination, Post, PostEntry, PostKey, PostSet, RawTimestamp,
    ThreadPage, ThreadRow,
};
pub use normalize::normalize_url;

/// Collapse every run of whitespace to a single space and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("Foo  Bar"), "Foo Bar");
        assert_eq!(collapse_whitespace("\n\t Foo\r\n Bar \n"), "Foo Bar");
        assert_eq!(collapse_whitespace("   "), "");
    }
}
