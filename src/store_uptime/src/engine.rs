//! The per-store estimation pipeline and the batch entry point.
//!
//! For each store with at least one poll:
//! 1. build the status timeline up to `now` ([`crate::timeline`]);
//! 2. drop everything before the longest lookback;
//! 3. resolve business hours and timezone, and clip the timeline to open hours
//!    ([`crate::business_hours`]);
//! 4. sum the result into the three trailing windows ([`crate::aggregate`]).
//!
//! Stores are independent, so they are processed on the current rayon pool. Output
//! rows are ordered by `store_id` and the whole batch fails on the first error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    aggregate::{StoreMetrics, aggregate},
    business_hours::{
        BusinessHourRule,
        clip::{clip_to_ranges, open_ranges_utc},
        resolve_business_hours,
    },
    error::EngineError,
    status::StatusPoll,
    timeline::build_timeline,
    tz::resolve_timezone,
    window::TrailingWindows,
};

/// A store's configured IANA timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimezoneRecord {
    /// Store the record belongs to.
    pub store_id: String,
    /// IANA zone name, e.g. `"America/New_York"`.
    pub timezone_name: String,
}

/// Everything a report is computed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportInput {
    /// Raw polls for every store, in any order.
    pub polls: Vec<StatusPoll>,
    /// Business-hour rules for every store.
    pub business_hours: Vec<BusinessHourRule>,
    /// Timezone records; at most one per store is used.
    pub timezones: Vec<TimezoneRecord>,
}

/// One store's slice of the input.
#[derive(Debug, Default)]
struct StoreInput<'a> {
    polls: Vec<&'a StatusPoll>,
    rules: Vec<&'a BusinessHourRule>,
    timezone: Option<&'a str>,
}

/// Compute one row per store with polls. Deterministic for identical inputs and `now`.
pub fn compute_report(
    polls: &[StatusPoll],
    business_hours: &[BusinessHourRule],
    timezones: &[TimezoneRecord],
    now: DateTime<Utc>,
) -> Result<Vec<StoreMetrics>, EngineError> {
    let windows = TrailingWindows::ending_at(now);
    let stores = group_by_store(polls, business_hours, timezones);
    debug!(stores = stores.len(), polls = polls.len(), %now, "computing report");

    stores
        .par_iter()
        .map(|(store_id, input)| store_metrics(store_id, input, &windows))
        .collect()
}

/// [`compute_report`] over a loaded [`ReportInput`].
pub fn compute_report_input(
    input: &ReportInput,
    now: DateTime<Utc>,
) -> Result<Vec<StoreMetrics>, EngineError> {
    compute_report(&input.polls, &input.business_hours, &input.timezones, now)
}

fn group_by_store<'a>(
    polls: &'a [StatusPoll],
    business_hours: &'a [BusinessHourRule],
    timezones: &'a [TimezoneRecord],
) -> Vec<(&'a str, StoreInput<'a>)> {
    let mut stores: BTreeMap<&'a str, StoreInput<'a>> = BTreeMap::new();
    for poll in polls {
        stores.entry(poll.store_id.as_str()).or_default().polls.push(poll);
    }
    for rule in business_hours {
        if let Some(store) = stores.get_mut(rule.store_id.as_str()) {
            store.rules.push(rule);
        }
    }
    for record in timezones {
        if let Some(store) = stores.get_mut(record.store_id.as_str()) {
            // first record wins
            store.timezone.get_or_insert(record.timezone_name.as_str());
        }
    }
    stores.into_iter().collect()
}

fn store_metrics(
    store_id: &str,
    input: &StoreInput<'_>,
    windows: &TrailingWindows,
) -> Result<StoreMetrics, EngineError> {
    let timeline = build_timeline(input.polls.iter().copied(), windows.now);
    let lookback = [(windows.lookback_start(), windows.now)];
    let recent = clip_to_ranges(&timeline, &lookback);

    let hours = resolve_business_hours(store_id, input.rules.iter().copied())?;
    let zone = resolve_timezone(input.timezone).map_err(|_| EngineError::UnknownTimezone {
        store_id: store_id.to_string(),
        name: input.timezone.unwrap_or_default().to_string(),
    })?;

    let counted = match recent.first() {
        None => recent,
        Some(first) => {
            match open_ranges_utc(store_id, &hours, zone, first.start, windows.now)? {
                Some(ranges) => clip_to_ranges(&recent, &ranges),
                None => recent,
            }
        }
    };
    Ok(aggregate(store_id, &counted, windows))
}
