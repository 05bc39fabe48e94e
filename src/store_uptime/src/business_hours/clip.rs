//! Map a local weekly schedule onto UTC and clip status intervals to it.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use super::BusinessHours;
use crate::{
    error::EngineError,
    status::StatusInterval,
    tz::{self, DstPolicy},
};

/// A half-open UTC range `[start, end)`.
pub type UtcRange = (DateTime<Utc>, DateTime<Utc>);

/// UTC ranges during which the store is open, restricted to `[from, to)`.
///
/// Returns `None` for [`BusinessHours::AlwaysOpen`], meaning no clipping is needed.
/// Every local calendar day touching the span is visited (plus one day either side
/// so zone offsets cannot drop a window), and the result is sorted and disjoint.
pub fn open_ranges_utc(
    store_id: &str,
    hours: &BusinessHours,
    zone: Tz,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Option<Vec<UtcRange>>, EngineError> {
    let BusinessHours::Weekly(days) = hours else {
        return Ok(None);
    };
    if to <= from {
        return Ok(Some(Vec::new()));
    }

    let first = from.with_timezone(&zone).date_naive();
    let first = first.checked_sub_days(Days::new(1)).unwrap_or(first);
    let last = to.with_timezone(&zone).date_naive();
    let last = last.checked_add_days(Days::new(1)).unwrap_or(last);

    let to_utc = |local: NaiveDateTime, policy: DstPolicy| {
        tz::from_local_naive_with_policy(local, zone, policy).map_err(|e| EngineError::LocalTime {
            store_id: store_id.to_string(),
            local,
            reason: format!("{e:#}"),
        })
    };

    let mut ranges = Vec::new();
    for day in first.iter_days().take_while(|d| *d <= last) {
        let weekday = day.weekday().num_days_from_monday() as usize;
        let midnight = day.and_time(NaiveTime::MIN);
        for w in &days[weekday] {
            let open = midnight + Duration::seconds(i64::from(w.start));
            let close = midnight + Duration::seconds(i64::from(w.end));
            // Widest UTC span whose wall clock can read inside [open, close).
            let lo = to_utc(open, DstPolicy::Lenient)?;
            let hi = to_utc(close, DstPolicy::LenientLatest)?;
            for (s, e) in wall_clock_ranges(zone, open, close, lo, hi) {
                let (s, e) = (s.max(from), e.min(to));
                if s < e {
                    ranges.push((s, e));
                }
            }
        }
    }
    Ok(Some(coalesce(ranges)))
}

/// UTC offset of `zone` at `at`, in seconds.
fn offset_secs(zone: Tz, at: DateTime<Utc>) -> i64 {
    i64::from(zone.offset_from_utc_datetime(&at.naive_utc()).fix().local_minus_utc())
}

/// Parts of `[lo, hi)` whose local wall-clock time lies in `[open, close)`.
///
/// `[lo, hi)` holds at most one offset change (zones shift at most once per day); across
/// a fall-back the repeated local hour yields two disjoint UTC pieces.
fn wall_clock_ranges(
    zone: Tz,
    open: NaiveDateTime,
    close: NaiveDateTime,
    lo: DateTime<Utc>,
    hi: DateTime<Utc>,
) -> Vec<UtcRange> {
    if hi <= lo {
        return Vec::new();
    }
    let first_off = offset_secs(zone, lo);
    let last_off = offset_secs(zone, hi - Duration::seconds(1));

    let mut pieces = vec![(lo, hi, first_off)];
    if first_off != last_off {
        // Binary search for the first second carrying `last_off`.
        let (mut a, mut b) = (lo, hi - Duration::seconds(1));
        while (b - a).num_seconds() > 1 {
            let mid = a + Duration::seconds((b - a).num_seconds() / 2);
            if offset_secs(zone, mid) == first_off {
                a = mid;
            } else {
                b = mid;
            }
        }
        pieces = vec![(lo, b, first_off), (b, hi, last_off)];
    }

    pieces
        .into_iter()
        .filter_map(|(a, b, off)| {
            let shift = Duration::seconds(off);
            let s = a.max((open - shift).and_utc());
            let e = b.min((close - shift).and_utc());
            (s < e).then_some((s, e))
        })
        .collect()
}

/// Sort and merge overlapping or touching ranges.
fn coalesce(mut ranges: Vec<UtcRange>) -> Vec<UtcRange> {
    ranges.sort();
    let mut out: Vec<UtcRange> = Vec::with_capacity(ranges.len());
    for (s, e) in ranges {
        match out.last_mut() {
            Some(last) if s <= last.1 => last.1 = last.1.max(e),
            _ => out.push((s, e)),
        }
    }
    out
}

/// Keep only the parts of `intervals` that fall inside `ranges`.
///
/// Both inputs must be sorted and internally non-overlapping; the output is too.
pub fn clip_to_ranges(intervals: &[StatusInterval], ranges: &[UtcRange]) -> Vec<StatusInterval> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < intervals.len() && j < ranges.len() {
        let iv = &intervals[i];
        let (rs, re) = ranges[j];
        let (s, e) = (iv.start.max(rs), iv.end.min(re));
        if s < e {
            out.push(StatusInterval {
                start: s,
                end: e,
                status: iv.status,
            });
        }
        if iv.end <= re {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business_hours::{BusinessHourRule, resolve_business_hours};
    use crate::status::PollStatus::{Active, Inactive};
    use chrono::TimeZone;

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap()
    }

    fn rule(day: i32, sh: u32, eh: u32) -> BusinessHourRule {
        BusinessHourRule {
            store_id: "s1".into(),
            day_of_week: day,
            start_time_local: NaiveTime::from_hms_opt(sh, 0, 0).unwrap(),
            end_time_local: NaiveTime::from_hms_opt(eh, 0, 0).unwrap(),
        }
    }

    #[test]
    fn always_open_needs_no_ranges() {
        let got = open_ranges_utc(
            "s1",
            &BusinessHours::AlwaysOpen,
            chrono_tz::America::Chicago,
            utc(1, 0, 0),
            utc(8, 0, 0),
        )
        .unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn local_hours_shift_by_zone_offset() {
        // 2024-01-15 is a Monday; New York is UTC-5 in January.
        let hours = resolve_business_hours("s1", &[rule(0, 9, 17)]).unwrap();
        let got = open_ranges_utc(
            "s1",
            &hours,
            chrono_tz::America::New_York,
            utc(14, 0, 0),
            utc(17, 0, 0),
        )
        .unwrap()
        .unwrap();
        assert_eq!(got, vec![(utc(15, 14, 0), utc(15, 22, 0))]);
    }

    #[test]
    fn ranges_are_trimmed_to_span() {
        let hours = resolve_business_hours("s1", &[rule(0, 9, 17)]).unwrap();
        let got = open_ranges_utc(
            "s1",
            &hours,
            chrono_tz::America::New_York,
            utc(15, 16, 0),
            utc(15, 18, 30),
        )
        .unwrap()
        .unwrap();
        assert_eq!(got, vec![(utc(15, 16, 0), utc(15, 18, 30))]);
    }

    #[test]
    fn dst_spring_forward_day_is_shorter() {
        // Sunday 2024-03-10 in New York: 01:00 EST -> 06:00Z, 04:00 EDT -> 08:00Z.
        let hours = resolve_business_hours("s1", &[rule(6, 1, 4)]).unwrap();
        let from = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();
        let got = open_ranges_utc("s1", &hours, chrono_tz::America::New_York, from, to)
            .unwrap()
            .unwrap();
        assert_eq!(
            got,
            vec![(
                Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap(),
            )]
        );
    }

    #[test]
    fn fall_back_repeated_hour_counts_twice() {
        // Sunday 2024-11-03 in New York: 01:00-01:59 happens in EDT (05:xxZ) and EST (06:xxZ).
        let rules = [BusinessHourRule {
            end_time_local: NaiveTime::from_hms_opt(1, 30, 0).unwrap(),
            ..rule(6, 0, 1)
        }];
        let hours = resolve_business_hours("s1", &rules).unwrap();
        let at = |h, m| Utc.with_ymd_and_hms(2024, 11, 3, h, m, 0).unwrap();
        let got = open_ranges_utc("s1", &hours, chrono_tz::America::New_York, at(0, 0), at(12, 0))
            .unwrap()
            .unwrap();
        assert_eq!(got, vec![(at(4, 0), at(5, 30)), (at(6, 0), at(6, 30))]);
    }

    #[test]
    fn midnight_fall_back_keeps_the_repeated_hour() {
        // Santiago leaves DST at 2024-04-07 00:00 local (03:00Z), repeating Saturday 23:00-24:00.
        let rules = [BusinessHourRule {
            end_time_local: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
            ..rule(5, 0, 1)
        }];
        let hours = resolve_business_hours("s1", &rules).unwrap();
        let at = |d, h, m| Utc.with_ymd_and_hms(2024, 4, d, h, m, 0).unwrap();
        let got = open_ranges_utc(
            "s1",
            &hours,
            chrono_tz::America::Santiago,
            at(5, 0, 0),
            at(8, 0, 0),
        )
        .unwrap()
        .unwrap();
        assert_eq!(got, vec![(at(6, 3, 0), at(7, 2, 59)), (at(7, 3, 0), at(7, 3, 59))]);
        let open: i64 = got.iter().map(|(s, e)| (*e - *s).num_minutes()).sum();
        assert_eq!(open, 1_439 + 59);
    }

    #[test]
    fn near_full_day_rules_stay_separate() {
        let all_day = BusinessHourRule {
            end_time_local: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            ..rule(0, 0, 1)
        };
        let mut tuesday = all_day.clone();
        tuesday.day_of_week = 1;
        let hours = resolve_business_hours("s1", &[all_day, tuesday]).unwrap();
        let got = open_ranges_utc("s1", &hours, chrono_tz::UTC, utc(15, 0, 0), utc(17, 0, 0))
            .unwrap()
            .unwrap();
        assert_eq!(
            got,
            vec![
                (utc(15, 0, 0), utc(15, 23, 59) + Duration::seconds(59)),
                (utc(16, 0, 0), utc(16, 23, 59) + Duration::seconds(59)),
            ]
        );
    }

    #[test]
    fn clipping_splits_and_drops_intervals() {
        let intervals = vec![
            StatusInterval { start: utc(15, 8, 0), end: utc(15, 10, 0), status: Inactive },
            StatusInterval { start: utc(15, 10, 0), end: utc(15, 20, 0), status: Active },
        ];
        let ranges = vec![(utc(15, 9, 0), utc(15, 11, 0)), (utc(15, 12, 0), utc(15, 13, 0))];
        let got = clip_to_ranges(&intervals, &ranges);
        assert_eq!(
            got,
            vec![
                StatusInterval { start: utc(15, 9, 0), end: utc(15, 10, 0), status: Inactive },
                StatusInterval { start: utc(15, 10, 0), end: utc(15, 11, 0), status: Active },
                StatusInterval { start: utc(15, 12, 0), end: utc(15, 13, 0), status: Active },
            ]
        );
        assert!(clip_to_ranges(&intervals, &[]).is_empty());
    }
}
