//! Sum clipped status time into the trailing windows.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    status::{PollStatus, StatusInterval},
    window::{ReportWindow, TrailingWindows},
};

/// One output row: a store's uptime and downtime over each trailing window.
///
/// Hour-window figures are minutes; day and week figures are hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetrics {
    /// Store the row describes.
    pub store_id: String,
    /// Minutes online in the last hour.
    pub uptime_last_hour: f64,
    /// Hours online in the last day.
    pub uptime_last_day: f64,
    /// Hours online in the last week.
    pub uptime_last_week: f64,
    /// Minutes offline in the last hour.
    pub downtime_last_hour: f64,
    /// Hours offline in the last day.
    pub downtime_last_day: f64,
    /// Hours offline in the last week.
    pub downtime_last_week: f64,
}

impl StoreMetrics {
    /// Column names, in output order.
    pub const COLUMNS: [&'static str; 7] = [
        "store_id",
        "uptime_last_hour",
        "uptime_last_day",
        "uptime_last_week",
        "downtime_last_hour",
        "downtime_last_day",
        "downtime_last_week",
    ];

    /// A row with every figure at zero.
    pub fn zero(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            uptime_last_hour: 0.0,
            uptime_last_day: 0.0,
            uptime_last_week: 0.0,
            downtime_last_hour: 0.0,
            downtime_last_day: 0.0,
            downtime_last_week: 0.0,
        }
    }

    /// `(uptime, downtime)` for `window`, in the window's reporting unit.
    pub fn window(&self, window: ReportWindow) -> (f64, f64) {
        match window {
            ReportWindow::LastHour => (self.uptime_last_hour, self.downtime_last_hour),
            ReportWindow::LastDay => (self.uptime_last_day, self.downtime_last_day),
            ReportWindow::LastWeek => (self.uptime_last_week, self.downtime_last_week),
        }
    }
}

/// Raw online/offline time inside one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowTotals {
    /// Time spent active.
    pub uptime: Duration,
    /// Time spent inactive.
    pub downtime: Duration,
}

/// Sum the overlap of every interval with `[window_start, now)`, split by status.
pub fn window_totals(
    intervals: &[StatusInterval],
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> WindowTotals {
    let mut totals = WindowTotals {
        uptime: Duration::zero(),
        downtime: Duration::zero(),
    };
    for iv in intervals {
        let overlap = iv.end.min(now) - iv.start.max(window_start);
        if overlap <= Duration::zero() {
            continue;
        }
        match iv.status {
            PollStatus::Active => totals.uptime += overlap,
            PollStatus::Inactive => totals.downtime += overlap,
        }
    }
    totals
}

/// Aggregate a store's clipped intervals into its output row.
pub fn aggregate(store_id: &str, intervals: &[StatusInterval], windows: &TrailingWindows) -> StoreMetrics {
    let mut row = StoreMetrics::zero(store_id);
    for window in ReportWindow::ALL {
        let totals = window_totals(intervals, windows.start(window), windows.now);
        let unit = window.unit();
        let (up, down) = (unit.convert(totals.uptime), unit.convert(totals.downtime));
        match window {
            ReportWindow::LastHour => {
                row.uptime_last_hour = up;
                row.downtime_last_hour = down;
            }
            ReportWindow::LastDay => {
                row.uptime_last_day = up;
                row.downtime_last_day = down;
            }
            ReportWindow::LastWeek => {
                row.uptime_last_week = up;
                row.downtime_last_week = down;
            }
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PollStatus::{Active, Inactive};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn iv(from_min: i64, to_min: i64, status: PollStatus) -> StatusInterval {
        StatusInterval {
            start: now() - Duration::minutes(from_min),
            end: now() - Duration::minutes(to_min),
            status,
        }
    }

    #[test]
    fn overlap_is_clipped_at_window_start() {
        // 90 minutes active straddling the one-hour boundary.
        let intervals = vec![iv(90, 0, Active)];
        let t = window_totals(&intervals, now() - Duration::hours(1), now());
        assert_eq!(t.uptime, Duration::minutes(60));
        assert_eq!(t.downtime, Duration::zero());
    }

    #[test]
    fn units_follow_window() {
        let windows = TrailingWindows::ending_at(now());
        let intervals = vec![iv(180, 60, Inactive), iv(60, 30, Active), iv(30, 0, Inactive)];
        let row = aggregate("s1", &intervals, &windows);
        assert_eq!(row.uptime_last_hour, 30.0);
        assert_eq!(row.downtime_last_hour, 30.0);
        assert_eq!(row.uptime_last_day, 0.5);
        assert_eq!(row.downtime_last_day, 2.5);
        assert_eq!(row.uptime_last_week, 0.5);
        assert_eq!(row.downtime_last_week, 2.5);
        assert_eq!(row.window(ReportWindow::LastHour), (30.0, 30.0));
    }

    #[test]
    fn intervals_older_than_a_week_count_nowhere() {
        let windows = TrailingWindows::ending_at(now());
        let old = StatusInterval {
            start: now() - Duration::days(9),
            end: now() - Duration::days(8),
            status: Active,
        };
        assert_eq!(aggregate("s1", &[old], &windows), StoreMetrics::zero("s1"));
    }
}
