//! Poll observations and the status intervals derived from them.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operational status reported by a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// Store was online.
    Active,
    /// Store was offline.
    Inactive,
}

impl PollStatus {
    /// Text form used in the polling table.
    pub const fn as_str(self) -> &'static str {
        match self {
            PollStatus::Active => "active",
            PollStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a status string is neither `active` nor `inactive`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown poll status {0:?} (expected \"active\" or \"inactive\")")]
pub struct ParsePollStatusError(pub String);

impl FromStr for PollStatus {
    type Err = ParsePollStatusError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("active") {
            Ok(PollStatus::Active)
        } else if t.eq_ignore_ascii_case("inactive") {
            Ok(PollStatus::Inactive)
        } else {
            Err(ParsePollStatusError(s.to_string()))
        }
    }
}

/// One timestamped observation of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPoll {
    /// Store the poll belongs to.
    pub store_id: String,
    /// When the poll was taken.
    pub timestamp_utc: DateTime<Utc>,
    /// What it observed.
    pub status: PollStatus,
}

impl StatusPoll {
    /// Convenience constructor.
    pub fn new(store_id: impl Into<String>, timestamp_utc: DateTime<Utc>, status: PollStatus) -> Self {
        Self {
            store_id: store_id.into(),
            timestamp_utc,
            status,
        }
    }
}

/// A half-open `[start, end)` UTC span during which a store held one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInterval {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
    /// Status held over the span.
    pub status: PollStatus,
}

impl StatusInterval {
    /// Length of the span (zero if `end <= start`).
    pub fn duration(&self) -> chrono::Duration {
        (self.end - self.start).max(chrono::Duration::zero())
    }
}
