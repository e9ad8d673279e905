//! Normalization of the forum's displayed post dates.
//!
//! The forum renders dates as `Today`, `Yesterday` or `day-month-year`, with
//! the time of day in a separate `HH:MM` element. Both are wall-clock values in
//! the forum's time zone; they are converted to UTC here so the rest of the
//! crawl only compares absolute instants.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use thiserror::Error;

static DATE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w-]+").expect("Invalid date token regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("malformed time token '{0}', expected HH:MM")]
    InvalidTime(String),
}

/// When a post (or a listing's last post) was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostedAt {
    /// A fully resolved instant.
    At(DateTime<Utc>),
    /// The date token was not understood; the raw text is kept for logging.
    Unparsed(String),
}

impl PostedAt {
    /// Whether this is strictly later than `checkpoint`.
    ///
    /// Unparsed dates are never considered newer.
    #[must_use]
    pub fn is_after(&self, checkpoint: DateTime<Utc>) -> bool {
        match self {
            Self::At(at) => *at > checkpoint,
            Self::Unparsed(_) => false,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::At(at) => Some(*at),
            Self::Unparsed(_) => None,
        }
    }
}

impl fmt::Display for PostedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M UTC")),
            Self::Unparsed(raw) => write!(f, "unparsed({raw})"),
        }
    }
}

/// Return the first run of word characters and dashes in `raw`.
///
/// Date cells are padded with newlines and indentation by the forum's
/// templates. If nothing matches the input is returned unchanged.
#[must_use]
pub fn clean_date_field(raw: &str) -> &str {
    DATE_TOKEN.find(raw).map_or(raw, |m| m.as_str())
}

/// Converts the forum's date and time tokens into UTC instants.
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    offset: FixedOffset,
}

impl DateNormalizer {
    /// Create a normalizer for a forum whose clock runs at `offset` from UTC.
    #[must_use]
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    #[must_use]
    pub fn utc() -> Self {
        Self::new(FixedOffset::east_opt(0).expect("zero offset is valid"))
    }

    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Today's date on the forum's clock.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    /// Normalize a date and time token relative to the current date.
    ///
    /// # Errors
    ///
    /// Returns an error if the time token is not a valid `HH:MM`.
    pub fn normalize(&self, raw_date: &str, raw_time: &str) -> Result<PostedAt, DateError> {
        self.normalize_on(self.today(), raw_date, raw_time)
    }

    /// Normalize a date and time token, resolving `Today` and `Yesterday`
    /// against `today`.
    ///
    /// # Errors
    ///
    /// Returns an error if the time token is not a valid `HH:MM`.
    pub fn normalize_on(
        &self,
        today: NaiveDate,
        raw_date: &str,
        raw_time: &str,
    ) -> Result<PostedAt, DateError> {
        let time = parse_time(raw_time)?;

        let Some(date) = parse_date(clean_date_field(raw_date), today) else {
            return Ok(PostedAt::Unparsed(raw_date.trim().to_string()));
        };

        let local = date.and_time(time);
        Ok(self
            .offset
            .from_local_datetime(&local)
            .single()
            .map_or_else(
                || PostedAt::Unparsed(raw_date.trim().to_string()),
                |at| PostedAt::At(at.with_timezone(&Utc)),
            ))
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, DateError> {
    let invalid = || DateError::InvalidTime(raw.trim().to_string());

    let (hour, minute) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

fn parse_date(token: &str, today: NaiveDate) -> Option<NaiveDate> {
    match token {
        "Today" => Some(today),
        "Yesterday" => today.pred_opt(),
        _ => {
            let mut parts = token.split('-');
            let day: u32 = parts.next()?.parse().ok()?;
            let month: u32 = parts.next()?.parse().ok()?;
            let year: i32 = parts.next()?.parse().ok()?;
            if parts.next().is_some() {
                return None;
            }
            NaiveDate::from_ymd_opt(year, month, day)
        }
    }
}
