//! The checkpoint log: when the last successful run started.
//!
//! A run that crawls and delivers without error ends by emitting one record on
//! [`CHECKPOINT_TARGET`]. [`checkpoint_layer`] routes exactly those events to
//! the log file, replacing its contents, so startup chatter and failed runs
//! never move the checkpoint. The next run reads the record's timestamp back.

use std::fs::OpenOptions;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, Level, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// `strftime` format of the timestamp that starts every checkpoint log line.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Tracing target of the success record. Nothing else reaches the log file.
pub const CHECKPOINT_TARGET: &str = "forum_digest::checkpoint::record";

static LINE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9-]{10}) ([0-9:]{8})").expect("Invalid checkpoint prefix regex")
});

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint log {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Record a successful run that started crawling at `crawl_started`.
///
/// Posts made after `crawl_started` are picked up by the next run.
pub fn record_success(crawl_started: DateTime<Utc>, posts: usize, since: DateTime<Utc>) {
    info!(
        target: CHECKPOINT_TARGET,
        "{} Finished: found {posts} new posts since {since}",
        crawl_started.format(LOG_TIMESTAMP_FORMAT)
    );
}

/// Tracing layer that writes success records to the log at `path`.
///
/// The record carries its own timestamp, so the layer prints the bare
/// message. Each record truncates the file first.
pub fn checkpoint_layer<S>(path: &Path) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(CheckpointFile {
            path: path.to_path_buf(),
        })
        .with_ansi(false)
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_filter(Targets::new().with_target(CHECKPOINT_TARGET, Level::INFO))
}

/// Opens the log for each record, replacing what was there.
struct CheckpointFile {
    path: PathBuf,
}

impl<'a> MakeWriter<'a> for CheckpointFile {
    type Writer = Box<dyn io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
        {
            Ok(file) => Box::new(file),
            Err(e) => {
                // Logging from inside the subscriber would re-enter it.
                eprintln!(
                    "Failed to write checkpoint log {}: {e}",
                    self.path.display()
                );
                Box::new(io::sink())
            }
        }
    }
}

/// Read the checkpoint from the log at `path`.
///
/// Falls back to `fallback_days` before now when the log does not exist or
/// holds no timestamped line.
///
/// # Errors
///
/// Returns an error if the log exists but cannot be read.
pub async fn read_checkpoint(
    path: &Path,
    fallback_days: u32,
) -> Result<DateTime<Utc>, CheckpointError> {
    read_checkpoint_at(path, fallback_days, Utc::now()).await
}

/// Like [`read_checkpoint`], with an explicit notion of "now".
///
/// # Errors
///
/// Returns an error if the log exists but cannot be read.
pub async fn read_checkpoint_at(
    path: &Path,
    fallback_days: u32,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, CheckpointError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), fallback_days, "No checkpoint log, using fallback age");
            return Ok(fallback(now, fallback_days));
        }
        Err(source) => {
            return Err(CheckpointError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if let Some(checkpoint) = latest_log_timestamp(&contents) {
        debug!(%checkpoint, "Checkpoint recovered from log");
        Ok(checkpoint)
    } else {
        info!(path = %path.display(), fallback_days, "No timestamp in checkpoint log, using fallback age");
        Ok(fallback(now, fallback_days))
    }
}

/// Find the timestamp of the last timestamped line in `contents`.
#[must_use]
pub fn latest_log_timestamp(contents: &str) -> Option<DateTime<Utc>> {
    contents.lines().rev().find_map(parse_line_timestamp)
}

/// Parse the `YYYY-MM-DD HH:MM:SS` prefix of a log line.
///
/// Fractional seconds and everything after them are ignored.
fn parse_line_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let caps = LINE_PREFIX.captures(line)?;

    let mut date = caps[1].split('-').map(str::parse::<u32>);
    let year = date.next()?.ok()?;
    let month = date.next()?.ok()?;
    let day = date.next()?.ok()?;

    let mut time = caps[2].split(':').map(str::parse::<u32>);
    let hour = time.next()?.ok()?;
    let minute = time.next()?.ok()?;
    let second = time.next()?.ok()?;

    let year = i32::try_from(year).ok()?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    Some(naive.and_utc())
}

fn fallback(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(days))
}
