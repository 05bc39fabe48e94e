//! Errors raised while computing a report.
use chrono::NaiveDateTime;
use thiserror::Error;

/// A failure inside the estimation engine. Any one of these aborts the whole report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The store's timezone record names a zone that does not exist.
    #[error("store {store_id}: unknown timezone {name:?}")]
    UnknownTimezone {
        /// Offending store.
        store_id: String,
        /// Zone name as recorded.
        name: String,
    },

    /// A business-hour rule uses a weekday outside `0..=6`.
    #[error("store {store_id}: day_of_week {day} is outside 0..=6")]
    InvalidWeekday {
        /// Offending store.
        store_id: String,
        /// Weekday as recorded.
        day: i32,
    },

    /// A local business-hour boundary could not be placed on the UTC timeline.
    #[error("store {store_id}: cannot map local time {local} to UTC: {reason}")]
    LocalTime {
        /// Offending store.
        store_id: String,
        /// The local wall-clock time.
        local: NaiveDateTime,
        /// Underlying conversion error.
        reason: String,
    },
}
