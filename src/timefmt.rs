use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Format of every date key in the store and every date argument.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar day of `ts` in `tz`, formatted as a store key.
pub fn day_key(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz).format(DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date, or `None` if it is not a real calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
