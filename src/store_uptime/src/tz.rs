//! Time zone parsing and conversion helpers.
//!
//! What this module provides:
//! - [`parse_ts_to_utc`]: Parse poll timestamps (RFC-3339 with an offset, or the raw
//!   `2023-01-22 12:09:39.388884 UTC` export form) into UTC.
//! - [`resolve_timezone`]: Map a store's optional IANA zone name to a [`Tz`], falling back
//!   to [`DEFAULT_TIMEZONE`] when the store has none.
//! - [`from_local_naive_with_policy`]: Convert a naive local timestamp in a zone to UTC,
//!   choosing how DST gaps and ambiguities are handled via [`DstPolicy`].
//!
//! Notes:
//! - Ambiguous local times happen during “fall back” when a wall time occurs twice.
//! - Nonexistent local times happen during “spring forward” when a wall time is skipped.
//! - Business-hour boundaries use [`DstPolicy::Lenient`] so that every configured local
//!   window maps to some UTC range; a boundary inside a gap is moved to the first valid
//!   instant after it, and an ambiguous boundary takes the earlier instant.
//! - All stored timestamps are UTC; local times only exist inside business-hour rules.
//!
//! Examples
//! - RFC-3339 with offset to UTC:
//!   "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
//! - New York “fall back” ambiguity (2024-11-03 01:30 occurs twice):
//!   PreferEarliest -> 05:30Z, PreferLatest -> 06:30Z.

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Zone assumed for stores without a timezone record.
pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

/// Naive layouts accepted after RFC-3339, tried in order. All are read as UTC.
const NAIVE_UTC_LAYOUTS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f UTC",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Poll timestamp -> UTC.
///
/// Accepts RFC-3339 with an explicit offset, or a naive `YYYY-MM-DD HH:MM:SS[.f]`
/// timestamp (optionally suffixed with ` UTC`) which is taken to already be UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
/// - "2023-01-22 12:09:39.388884 UTC" -> "2023-01-22T12:09:39.388884Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_UTC_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(s, layout).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow!("bad timestamp: {s}"))
}

/// Resolve a store's zone name, falling back to [`DEFAULT_TIMEZONE`] when absent or blank.
///
/// Errors:
/// - The name is present but is not a known IANA zone.
pub fn resolve_timezone(name: Option<&str>) -> anyhow::Result<Tz> {
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_TIMEZONE);
    name.parse::<Tz>()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("bad tz: {name}"))
}

/// Policy for handling DST edge cases when converting local naive timestamps to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstPolicy {
    /// Strict behavior: error on ambiguous (fall-back) or nonexistent (spring-forward) local times.
    Strict,
    /// For ambiguous local times (two possible instants), pick the earliest instant
    /// (typically the DST occurrence).
    PreferEarliest,
    /// For ambiguous local times (two possible instants), pick the latest instant
    /// (typically the standard-time occurrence).
    PreferLatest,
    /// For nonexistent local times (spring-forward gap), shift forward in one-minute
    /// increments until the first valid instant is found (capped at 2 hours).
    ShiftForward,
    /// `PreferEarliest` for ambiguous times combined with `ShiftForward` for gaps.
    Lenient,
    /// `PreferLatest` for ambiguous times combined with `ShiftForward` for gaps.
    LenientLatest,
}

/// Convert a naive local timestamp to UTC using a specific IANA time zone and DST policy.
///
/// Behavior:
/// - If the local time maps to a single instant, that instant is returned.
/// - If the local time is ambiguous (fall-back), behavior depends on `policy`:
///   - PreferEarliest/Lenient -> pick the earlier instant
///   - PreferLatest/LenientLatest -> pick the later instant
///   - Strict/ShiftForward -> return an error
/// - If the local time is nonexistent (spring-forward gap), behavior depends on `policy`:
///   - ShiftForward/Lenient/LenientLatest -> step forward minute-by-minute until a valid instant is found (max 2 hours)
///   - Strict/PreferEarliest/PreferLatest -> return an error
pub fn from_local_naive_with_policy(
    naive: NaiveDateTime,
    tz: Tz,
    policy: DstPolicy,
) -> anyhow::Result<DateTime<Utc>> {
    use chrono::offset::LocalResult::*;
    match tz.from_local_datetime(&naive) {
        Single(dt) => Ok(dt.with_timezone(&Utc)),
        Ambiguous(a, b) => match policy {
            DstPolicy::PreferEarliest | DstPolicy::Lenient => Ok(a.with_timezone(&Utc)),
            DstPolicy::PreferLatest | DstPolicy::LenientLatest => Ok(b.with_timezone(&Utc)),
            _ => Err(anyhow!("ambiguous local time {naive} in {tz}")),
        },
        None => match policy {
            DstPolicy::ShiftForward | DstPolicy::Lenient | DstPolicy::LenientLatest => {
                let mut t = naive;
                for _ in 0..120 {
                    t += chrono::Duration::minutes(1);
                    if let Single(dt) = tz.from_local_datetime(&t) {
                        return Ok(dt.with_timezone(&Utc));
                    }
                }
                Err(anyhow!("nonexistent local time {naive} in {tz}"))
            }
            _ => Err(anyhow!("nonexistent local time {naive} in {tz}")),
        },
    }
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
