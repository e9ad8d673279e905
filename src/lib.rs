//! Forum digest bot library.
//!
//! Crawls a vBulletin forum for posts made since the previous run, groups them
//! by thread title and posts a short digest to a Discord channel.

pub mod chat;
pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod crawler;
pub mod dates;
pub mod digest;
pub mod fetch;
pub mod forum;
pub mod summary;
