//! Turn unordered polls into a contiguous status timeline.
//!
//! Each poll is assumed to hold until the next poll of the same store, and the most
//! recent poll holds until `now`. The output covers exactly `[first poll, now)`
//! with non-overlapping intervals in ascending order.
//!
//! Edge cases:
//! - Polls at or after `now` are ignored.
//! - Polls sharing a timestamp keep their input order; the last one wins and the
//!   others produce zero-length intervals, which are dropped.

use chrono::{DateTime, Utc};

use crate::status::{StatusInterval, StatusPoll};

/// Build the status timeline for one store's polls.
pub fn build_timeline<'a, I>(polls: I, now: DateTime<Utc>) -> Vec<StatusInterval>
where
    I: IntoIterator<Item = &'a StatusPoll>,
{
    let mut sorted: Vec<&StatusPoll> = polls
        .into_iter()
        .filter(|p| p.timestamp_utc < now)
        .collect();
    // stable: ties keep input order
    sorted.sort_by_key(|p| p.timestamp_utc);

    let mut out = Vec::with_capacity(sorted.len());
    for (i, poll) in sorted.iter().enumerate() {
        let end = sorted.get(i + 1).map_or(now, |next| next.timestamp_utc);
        if poll.timestamp_utc < end {
            out.push(StatusInterval {
                start: poll.timestamp_utc,
                end,
                status: poll.status,
            });
        }
    }
    out
}
