//! Store business hours: rules, per-store resolution, and clipping.
//!
//! Rules are local wall-clock windows keyed by weekday (`0 = Monday … 6 = Sunday`).
//! [`resolve_business_hours`] folds a store's rules into a [`BusinessHours`] value:
//! - no rules at all means the store is open around the clock;
//! - once a store has any rule, weekdays without rules are closed;
//! - a rule whose end is not after its start is an empty window (it never wraps
//!   past midnight);
//! - overlapping rules on one weekday are merged.
//!
//! [`clip`] turns the local schedule into UTC ranges for a given span and trims a
//! status timeline down to them.

pub mod clip;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Seconds in a local day; a window may end exactly here (local midnight of the next day).
pub const DAY_SECS: u32 = 86_400;

/// One configured opening window for a store on one weekday, in local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHourRule {
    /// Store the rule belongs to.
    pub store_id: String,
    /// Weekday, `0 = Monday … 6 = Sunday`.
    pub day_of_week: i32,
    /// Local opening time.
    pub start_time_local: NaiveTime,
    /// Local closing time.
    pub end_time_local: NaiveTime,
}

/// An opening window as seconds since local midnight, `start < end <= DAY_SECS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalWindow {
    /// Seconds after midnight the store opens.
    pub start: u32,
    /// Seconds after midnight the store closes.
    pub end: u32,
}

impl LocalWindow {
    /// Window from wall-clock times; `None` when it would be empty.
    pub fn from_times(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        let (s, e) = (start.num_seconds_from_midnight(), end.num_seconds_from_midnight());
        (s < e).then_some(Self { start: s, end: e })
    }

    /// The whole local day.
    pub const fn all_day() -> Self {
        Self {
            start: 0,
            end: DAY_SECS,
        }
    }
}

/// A store's resolved weekly schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessHours {
    /// No rules configured: every instant counts.
    AlwaysOpen,
    /// Sorted, disjoint windows per weekday (index 0 = Monday).
    Weekly([Vec<LocalWindow>; 7]),
}

impl BusinessHours {
    /// Windows open on `weekday` (`0 = Monday`).
    pub fn windows_on(&self, weekday: usize) -> Vec<LocalWindow> {
        match self {
            BusinessHours::AlwaysOpen => vec![LocalWindow::all_day()],
            BusinessHours::Weekly(days) => days.get(weekday).cloned().unwrap_or_default(),
        }
    }
}

/// Fold one store's rules into its weekly schedule.
pub fn resolve_business_hours<'a, I>(store_id: &str, rules: I) -> Result<BusinessHours, EngineError>
where
    I: IntoIterator<Item = &'a BusinessHourRule>,
{
    let mut days: [Vec<LocalWindow>; 7] = Default::default();
    let mut any_rule = false;

    for rule in rules {
        any_rule = true;
        let day = usize::try_from(rule.day_of_week)
            .ok()
            .filter(|d| *d < 7)
            .ok_or_else(|| EngineError::InvalidWeekday {
                store_id: store_id.to_string(),
                day: rule.day_of_week,
            })?;
        if let Some(w) = LocalWindow::from_times(rule.start_time_local, rule.end_time_local) {
            days[day].push(w);
        }
    }

    if !any_rule {
        return Ok(BusinessHours::AlwaysOpen);
    }
    for windows in days.iter_mut() {
        merge_windows(windows);
    }
    Ok(BusinessHours::Weekly(days))
}

/// Sort and coalesce overlapping or touching windows in place.
fn merge_windows(windows: &mut Vec<LocalWindow>) {
    windows.sort();
    let mut merged: Vec<LocalWindow> = Vec::with_capacity(windows.len());
    for w in windows.drain(..) {
        match merged.last_mut() {
            Some(last) if w.start <= last.end => last.end = last.end.max(w.end),
            _ => merged.push(w),
        }
    }
    *windows = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn rule(day: i32, start: NaiveTime, end: NaiveTime) -> BusinessHourRule {
        BusinessHourRule {
            store_id: "s1".into(),
            day_of_week: day,
            start_time_local: start,
            end_time_local: end,
        }
    }

    #[test]
    fn no_rules_means_always_open() {
        let bh = resolve_business_hours("s1", std::iter::empty()).unwrap();
        assert_eq!(bh, BusinessHours::AlwaysOpen);
        assert_eq!(bh.windows_on(3), vec![LocalWindow::all_day()]);
    }

    #[test]
    fn unlisted_weekdays_are_closed_once_any_rule_exists() {
        let rules = vec![rule(0, t(9, 0), t(17, 0))];
        let bh = resolve_business_hours("s1", &rules).unwrap();
        assert_eq!(
            bh.windows_on(0),
            vec![LocalWindow { start: 9 * 3600, end: 17 * 3600 }]
        );
        for day in 1..7 {
            assert!(bh.windows_on(day).is_empty(), "day {day} should be closed");
        }
    }

    #[test]
    fn inverted_rule_is_empty_not_overnight() {
        let rules = vec![rule(2, t(22, 0), t(2, 0)), rule(3, t(8, 0), t(8, 0))];
        let bh = resolve_business_hours("s1", &rules).unwrap();
        assert!(bh.windows_on(2).is_empty());
        assert!(bh.windows_on(3).is_empty());
        assert_ne!(bh, BusinessHours::AlwaysOpen);
    }

    #[test]
    fn overlapping_rules_merge_and_disjoint_ones_stay_apart() {
        let rules = vec![
            rule(4, t(12, 0), t(17, 0)),
            rule(4, t(9, 0), t(13, 0)),
            rule(4, t(19, 0), t(22, 0)),
        ];
        let bh = resolve_business_hours("s1", &rules).unwrap();
        assert_eq!(
            bh.windows_on(4),
            vec![
                LocalWindow { start: 9 * 3600, end: 17 * 3600 },
                LocalWindow { start: 19 * 3600, end: 22 * 3600 },
            ]
        );
    }

    #[test]
    fn weekday_out_of_range_is_rejected() {
        let err = resolve_business_hours("s9", &[rule(7, t(9, 0), t(10, 0))]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidWeekday { day: 7, .. }));
        let err = resolve_business_hours("s9", &[rule(-1, t(9, 0), t(10, 0))]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidWeekday { day: -1, .. }));
    }
}
