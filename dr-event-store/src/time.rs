//! Timestamp parsing and rendering
//!
//! Inbound timestamps arrive in a handful of textual formats, with or without
//! an explicit offset. Everything is normalized to UTC (whole seconds) before
//! it reaches the store. Rendering reprojects a stored instant into a display
//! timezone.
//!
//! ## Accepted formats (tried in this order)
//! 1. ISO-8601 with offset (`2025-06-01T14:00:00+02:00`, `...+0200`, `...Z`),
//!    `T` or space separator, optional seconds and fraction
//! 2. `YYYY-MM-DDTHH:MM[:SS]`
//! 3. `YYYY/MM/DD HH:MM[:SS]`
//! 4. `MM/DD/YYYY HH:MM[:SS]`
//!
//! The first format that parses wins, so `01/02/2025 10:00` is always
//! January 2nd.

use crate::types::Timestamp;
use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, SubsecRound, TimeZone, Utc};
use chrono_tz::Tz;

/// Offset formats tried after RFC 3339, with `T` separator and numeric offset
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"];

/// Naive fallback formats, in resolution order
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Errors produced while interpreting a timestamp or timezone
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("unrecognized timestamp format: {0:?}")]
    Unrecognized(String),

    #[error("timestamp must include timezone: {0:?}")]
    MissingTimezone(String),

    #[error("local time {time} does not exist in {timezone}")]
    NonexistentLocalTime { time: String, timezone: String },

    #[error("unknown timezone: {0:?}")]
    UnknownTimezone(String),
}

/// Parses user supplied timestamps and renders stored ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeCodec {
    strict: bool,
}

impl Default for TimeCodec {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TimeCodec {
    /// Create a codec; in strict mode naive timestamps need a timezone hint
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Parse a timestamp into a UTC instant truncated to whole seconds
    ///
    /// Explicit offsets always win. A naive timestamp is interpreted in
    /// `tz_hint` when one is given; without a hint it is an error in strict
    /// mode and assumed to be UTC otherwise.
    pub fn parse(&self, text: &str, tz_hint: Option<Tz>) -> Result<Timestamp, TimeError> {
        let text = text.trim();

        if let Some(dt) = parse_with_offset(text) {
            return Ok(dt.with_timezone(&Utc).trunc_subsecs(0));
        }

        let naive = parse_naive(text).ok_or_else(|| TimeError::Unrecognized(text.to_string()))?;

        let instant = match tz_hint {
            Some(tz) => localize(naive, tz)?,
            None if self.strict => return Err(TimeError::MissingTimezone(text.to_string())),
            None => Utc.from_utc_datetime(&naive),
        };

        Ok(instant.trunc_subsecs(0))
    }

    /// Render an instant as ISO-8601 in `target_tz`
    ///
    /// An unknown timezone renders in UTC instead of failing.
    pub fn render(instant: Timestamp, target_tz: Option<&str>) -> String {
        let Some(name) = target_tz else {
            return instant.to_rfc3339();
        };

        match parse_timezone(name) {
            Ok(tz) => instant.with_timezone(&tz).to_rfc3339(),
            Err(e) => {
                log::debug!("{}, rendering in UTC", e);
                instant.to_rfc3339()
            }
        }
    }
}

/// Parse an IANA timezone identifier
pub fn parse_timezone(name: &str) -> Result<Tz, TimeError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TimeError::UnknownTimezone(name.to_string()))
}

/// Convert epoch seconds from storage back into a timestamp
pub fn from_epoch_seconds(secs: i64) -> Option<Timestamp> {
    DateTime::from_timestamp(secs, 0)
}

fn parse_with_offset(text: &str) -> Option<DateTime<FixedOffset>> {
    let mut normalized = text.to_string();

    // ISO-8601 allows a space or lowercase `t` between date and time
    if matches!(text.as_bytes().get(10), Some(b' ' | b't')) {
        normalized.replace_range(10..11, "T");
    }
    if let Some(head) = normalized.strip_suffix(|c: char| c == 'Z' || c == 'z') {
        normalized = format!("{}+00:00", head);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt);
    }

    // `%z` takes both `+02:00` and `+0200`
    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Result<Timestamp, TimeError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        // DST fold: the earlier of the two instants
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(TimeError::NonexistentLocalTime {
            time: naive.to_string(),
            timezone: tz.name().to_string(),
        }),
    }
}
