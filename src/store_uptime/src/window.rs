//! Trailing report windows and the clock that anchors them.
//!
//! A [`ReportWindow`] is one of the three fixed lookbacks a report covers (last hour,
//! last day, last week). [`TrailingWindows`] pins all three to a single `now`, which is
//! read once from a [`Clock`] and then threaded through the whole computation so a
//! report never mixes instants.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use store_uptime::window::{ReportWindow, TrailingWindows};
//!
//! let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
//! let w = TrailingWindows::ending_at(now);
//! assert_eq!(w.start(ReportWindow::LastHour), Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap());
//! assert_eq!("1W".parse::<ReportWindow>().unwrap(), ReportWindow::LastWeek);
//! ```

use std::{fmt, str::FromStr};

use anyhow::bail;
use chrono::{DateTime, Duration, Utc};

/// Number of seconds in a minute.
pub const SECS_PER_MINUTE: i64 = 60;
/// Number of seconds in an hour.
pub const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
/// Number of seconds in a day.
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
/// Number of seconds in a week.
pub const SECS_PER_WEEK: i64 = 7 * SECS_PER_DAY;

/// Source of "now" for a report.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Unit a window's totals are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUnit {
    /// Fractional minutes.
    Minutes,
    /// Fractional hours.
    Hours,
}

impl WindowUnit {
    /// Express `d` in this unit.
    pub fn convert(self, d: Duration) -> f64 {
        let ms = d.num_milliseconds() as f64;
        match self {
            WindowUnit::Minutes => ms / (SECS_PER_MINUTE as f64 * 1000.0),
            WindowUnit::Hours => ms / (SECS_PER_HOUR as f64 * 1000.0),
        }
    }
}

/// One of the trailing lookback periods a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportWindow {
    /// `[now - 1h, now)`, reported in minutes.
    LastHour,
    /// `[now - 1d, now)`, reported in hours.
    LastDay,
    /// `[now - 7d, now)`, reported in hours.
    LastWeek,
}

impl ReportWindow {
    /// Every window, shortest first.
    pub const ALL: [ReportWindow; 3] = [
        ReportWindow::LastHour,
        ReportWindow::LastDay,
        ReportWindow::LastWeek,
    ];

    /// Wall-clock length of the window.
    pub fn span(self) -> Duration {
        match self {
            ReportWindow::LastHour => Duration::seconds(SECS_PER_HOUR),
            ReportWindow::LastDay => Duration::seconds(SECS_PER_DAY),
            ReportWindow::LastWeek => Duration::seconds(SECS_PER_WEEK),
        }
    }

    /// Reporting unit.
    pub const fn unit(self) -> WindowUnit {
        match self {
            ReportWindow::LastHour => WindowUnit::Minutes,
            ReportWindow::LastDay | ReportWindow::LastWeek => WindowUnit::Hours,
        }
    }
}

/// Display/parse for CLI ergonomics (`"1h"`, `"1D"`, `"1W"`)
impl fmt::Display for ReportWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportWindow::LastHour => "1h",
            ReportWindow::LastDay => "1D",
            ReportWindow::LastWeek => "1W",
        };
        f.write_str(s)
    }
}

impl FromStr for ReportWindow {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1h" | "hour" => Ok(ReportWindow::LastHour),
            "1D" | "day" => Ok(ReportWindow::LastDay),
            "1W" | "week" => Ok(ReportWindow::LastWeek),
            "" => bail!("empty window"),
            other => bail!("unknown window: {other}"),
        }
    }
}

/// The three window starts derived from one `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingWindows {
    /// Exclusive end shared by every window.
    pub now: DateTime<Utc>,
    /// `now - 1h`
    pub last_hour_start: DateTime<Utc>,
    /// `now - 1d`
    pub last_day_start: DateTime<Utc>,
    /// `now - 7d`
    pub last_week_start: DateTime<Utc>,
}

impl TrailingWindows {
    /// Anchor all windows at `now`.
    pub fn ending_at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            last_hour_start: now - ReportWindow::LastHour.span(),
            last_day_start: now - ReportWindow::LastDay.span(),
            last_week_start: now - ReportWindow::LastWeek.span(),
        }
    }

    /// Anchor all windows at the clock's current instant.
    pub fn from_clock(clock: &dyn Clock) -> Self {
        Self::ending_at(clock.now())
    }

    /// Inclusive start of `window`.
    pub fn start(&self, window: ReportWindow) -> DateTime<Utc> {
        match window {
            ReportWindow::LastHour => self.last_hour_start,
            ReportWindow::LastDay => self.last_day_start,
            ReportWindow::LastWeek => self.last_week_start,
        }
    }

    /// Earliest instant any window looks at.
    pub fn lookback_start(&self) -> DateTime<Utc> {
        self.last_week_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn windows_hang_off_one_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let w = TrailingWindows::from_clock(&FixedClock(now));
        assert_eq!(w.now, now);
        assert_eq!(w.last_hour_start, Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap());
        assert_eq!(w.last_day_start, Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap());
        assert_eq!(w.last_week_start, Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap());
        assert_eq!(w.lookback_start(), w.last_week_start);
    }

    #[test]
    fn units_convert_fractionally() {
        let d = Duration::seconds(90);
        assert_eq!(WindowUnit::Minutes.convert(d), 1.5);
        assert_eq!(WindowUnit::Hours.convert(Duration::minutes(45)), 0.75);
    }

    #[test]
    fn display_parse_round_trip() {
        for w in ReportWindow::ALL {
            assert_eq!(w.to_string().parse::<ReportWindow>().unwrap(), w);
        }
        assert!("3M".parse::<ReportWindow>().is_err());
        assert!("".parse::<ReportWindow>().is_err());
    }
}
