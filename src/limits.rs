use chrono::NaiveDate;

/// Longest stay a single booking may cover.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Upper bound on a property's configured capacity.
pub const MAX_GUESTS_PER_PROPERTY: u32 = 64;

pub const MAX_BOOKINGS_PER_PROPERTY: usize = 10_000;

pub const MAX_PROPERTIES: usize = 100_000;

/// Widest window `blocked_dates` will expand.
pub const MAX_CALENDAR_WINDOW_DAYS: i64 = 3 * 366;

pub const MAX_LINE_LEN: usize = 4096;

pub fn min_valid_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub fn max_valid_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2200, 12, 31).unwrap_or(NaiveDate::MAX)
}
